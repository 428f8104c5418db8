//! Space-time volume - frames stacked along a time axis.

use rayon::prelude::*;

use super::{Frame, FrameShape};
use crate::schema::Axis;

/// Dense 4D volume of intensities indexed `(t, y, x, c)`.
///
/// Data is stored as one flat array with indexing:
/// `[((t * height + y) * width + x) * channels + c]`, so each time step is a
/// contiguous copy of the corresponding input frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceTimeVolume {
    data: Vec<f32>,
    time: usize,
    height: usize,
    width: usize,
    channels: usize,
}

impl SpaceTimeVolume {
    /// Stack `frames` in order along the time axis.
    ///
    /// Every frame must have the shape of the first one.
    pub fn build(frames: &[Frame]) -> Result<Self, VolumeError> {
        let first = frames.first().ok_or(VolumeError::EmptyInput)?;
        let expected = first.shape();

        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.shape() != expected)
        {
            return Err(VolumeError::ShapeMismatch {
                index,
                expected,
                found: frame.shape(),
            });
        }

        let mut data = Vec::with_capacity(frames.len() * expected.len());
        for frame in frames {
            data.extend_from_slice(frame.as_slice());
        }

        Ok(Self {
            data,
            time: frames.len(),
            height: expected.height,
            width: expected.width,
            channels: expected.channels,
        })
    }

    /// Extents as `(T, H, W, C)`.
    #[inline]
    pub fn extents(&self) -> (usize, usize, usize, usize) {
        (self.time, self.height, self.width, self.channels)
    }

    /// Extent along one non-channel axis.
    #[inline]
    pub fn extent(&self, axis: Axis) -> usize {
        match axis {
            Axis::Time => self.time,
            Axis::Row => self.height,
            Axis::Column => self.width,
        }
    }

    #[inline]
    pub fn time(&self) -> usize {
        self.time
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Shape of one time step.
    pub fn frame_shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    /// Raw samples in `(t, y, x, c)` order.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Offset of pixel (t, y, x) in the raw data.
    #[inline]
    pub fn idx(&self, t: usize, y: usize, x: usize) -> usize {
        ((t * self.height + y) * self.width + x) * self.channels
    }

    /// Value at (t, y, x, c).
    #[inline]
    pub fn get(&self, t: usize, y: usize, x: usize, c: usize) -> f32 {
        self.data[self.idx(t, y, x) + c]
    }

    /// All channels of pixel (t, y, x).
    #[inline]
    pub fn pixel(&self, t: usize, y: usize, x: usize) -> &[f32] {
        let start = self.idx(t, y, x);
        &self.data[start..start + self.channels]
    }

    /// Copy of time step `t`.
    pub fn frame(&self, t: usize) -> Frame {
        let len = self.frame_shape().len();
        let start = t * len;
        Frame::from_parts(
            self.width,
            self.height,
            self.channels,
            self.data[start..start + len].to_vec(),
        )
    }

    /// Per-channel (min, max) over the whole volume.
    pub fn channel_range(&self) -> Vec<(f32, f32)> {
        let channels = self.channels;
        self.data
            .par_chunks(channels * 4096)
            .map(|block| {
                let mut range = vec![(f32::INFINITY, f32::NEG_INFINITY); channels];
                for px in block.chunks_exact(channels) {
                    for (r, &v) in range.iter_mut().zip(px) {
                        r.0 = r.0.min(v);
                        r.1 = r.1.max(v);
                    }
                }
                range
            })
            .reduce(
                || vec![(f32::INFINITY, f32::NEG_INFINITY); channels],
                |a, b| {
                    a.into_iter()
                        .zip(b)
                        .map(|(x, y)| (x.0.min(y.0), x.1.max(y.1)))
                        .collect()
                },
            )
    }

    /// Stretch every channel independently onto `0.0..=255.0`.
    ///
    /// A channel with a single value throughout is left untouched.
    pub fn normalize_channels(&self) -> Self {
        let ranges = self.channel_range();
        let channels = self.channels;
        let mut data = self.data.clone();

        data.par_chunks_mut(channels * 4096).for_each(|block| {
            for px in block.chunks_exact_mut(channels) {
                for (v, &(lo, hi)) in px.iter_mut().zip(&ranges) {
                    if hi > lo {
                        *v = (*v - lo) / (hi - lo) * 255.0;
                    }
                }
            }
        });

        Self { data, ..*self }
    }
}

/// Volume construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VolumeError {
    #[error("Cannot build a volume from an empty frame sequence")]
    EmptyInput,
    #[error("Frame {index} has shape {found}, expected {expected}")]
    ShapeMismatch {
        index: usize,
        expected: FrameShape,
        found: FrameShape,
    },
}
