//! Axis projection - re-slicing a space-time volume for a view mode.
//!
//! A projection walks the output coordinates `(frame, row, column)` and reads
//! the volume pixel that the mode's [`AxisMapping`] assigns to them. Every
//! output sample therefore indexes a real recorded pixel `(t, y, x)`, and its
//! full channel vector is copied through unchanged, including in the slice
//! views where the display axes are not the native (row, column) pair.
//!
//! [`AxisMapping`]: crate::schema::AxisMapping

use rayon::prelude::*;

use super::{Frame, FrameShape, SpaceTimeVolume};
use crate::schema::{Axis, ViewMode};

/// Ordered display frames derived from a volume for one view mode.
///
/// Immutable once built; consumers share it behind an `Arc` so a playback tick
/// or an export never observes a half-built sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSequence {
    mode: ViewMode,
    fixed_index: Option<usize>,
    frames: Vec<Frame>,
}

impl OutputSequence {
    /// View mode this sequence was projected for.
    #[inline]
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Selected index along the mode's fixed axis (`None` for the spatial view).
    #[inline]
    pub fn fixed_index(&self) -> Option<usize> {
        self.fixed_index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Shape shared by every frame, if there are any.
    pub fn frame_shape(&self) -> Option<FrameShape> {
        self.frames.first().map(Frame::shape)
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl<'a> IntoIterator for &'a OutputSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Default fixed index for `mode`: the midpoint of its fixed axis.
///
/// Returns 0 for the spatial view, which has no fixed axis.
pub fn default_fixed_index(volume: &SpaceTimeVolume, mode: ViewMode) -> usize {
    mode.mapping()
        .fixed
        .map(|axis| volume.extent(axis) / 2)
        .unwrap_or(0)
}

/// Check `fixed_index` against the fixed axis of `mode`.
pub fn check_fixed_index(
    volume: &SpaceTimeVolume,
    mode: ViewMode,
    fixed_index: usize,
) -> Result<Option<usize>, ProjectionError> {
    match mode.mapping().fixed {
        None => Ok(None),
        Some(axis) => {
            let extent = volume.extent(axis);
            if fixed_index < extent {
                Ok(Some(fixed_index))
            } else {
                Err(ProjectionError::IndexOutOfRange {
                    mode,
                    axis,
                    index: fixed_index,
                    extent,
                })
            }
        }
    }
}

/// Project `volume` for `mode`.
///
/// - `Spatial`: output `i` is time step `i`; `fixed_index` is ignored.
/// - `VerticalSlice`: output `x` is the H×T grid with `[y][t] = volume[t][y][x]`.
/// - `HorizontalSlice`: output `y` is the W×T grid with `[x][t] = volume[t][y][x]`.
///
/// Frames are built in parallel; the result is deterministic.
pub fn project(
    volume: &SpaceTimeVolume,
    mode: ViewMode,
    fixed_index: usize,
) -> Result<OutputSequence, ProjectionError> {
    let fixed_index = check_fixed_index(volume, mode, fixed_index)?;

    let mapping = mode.mapping();
    let frame_count = volume.extent(mapping.frame);
    let rows = volume.extent(mapping.rows);
    let columns = volume.extent(mapping.columns);
    let channels = volume.channels();

    let frames: Vec<Frame> = (0..frame_count)
        .into_par_iter()
        .map(|f| {
            let mut data = Vec::with_capacity(rows * columns * channels);
            for row in 0..rows {
                for column in 0..columns {
                    let [t, y, x] = mapping.volume_coords(f, row, column);
                    data.extend_from_slice(volume.pixel(t, y, x));
                }
            }
            Frame::from_parts(columns, rows, channels, data)
        })
        .collect();

    Ok(OutputSequence {
        mode,
        fixed_index,
        frames,
    })
}

/// Projection errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("Fixed index {index} out of range for {mode} view ({axis} extent is {extent})")]
    IndexOutOfRange {
        mode: ViewMode,
        axis: Axis,
        index: usize,
        extent: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Volume whose single channel encodes its coordinate.
    fn coded_volume(t: usize, h: usize, w: usize) -> SpaceTimeVolume {
        let frames: Vec<Frame> = (0..t)
            .map(|ti| Frame::from_fn(w, h, 1, |x, y, _| (ti * 10000 + y * 100 + x) as f32).unwrap())
            .collect();
        SpaceTimeVolume::build(&frames).unwrap()
    }

    #[test]
    fn test_spatial_is_identity() {
        let volume = coded_volume(5, 3, 4);
        let out = project(&volume, ViewMode::Spatial, 12345).unwrap();

        assert_eq!(out.len(), 5);
        assert_eq!(out.fixed_index(), None);
        for (i, frame) in out.iter().enumerate() {
            assert_eq!(frame, &volume.frame(i));
        }
    }

    #[test]
    fn test_vertical_slice_layout() {
        let (t, h, w) = (6, 3, 4);
        let volume = coded_volume(t, h, w);
        let out = project(&volume, ViewMode::VerticalSlice, 1).unwrap();

        assert_eq!(out.len(), w);
        assert_eq!(out.fixed_index(), Some(1));
        for x0 in 0..w {
            let frame = out.get(x0).unwrap();
            // Rows are y, columns are t
            assert_eq!((frame.height(), frame.width()), (h, t));
            for y in 0..h {
                for ti in 0..t {
                    assert_eq!(frame.get(ti, y, 0), volume.get(ti, y, x0, 0));
                }
            }
        }
    }

    #[test]
    fn test_horizontal_slice_layout() {
        let (t, h, w) = (6, 3, 4);
        let volume = coded_volume(t, h, w);
        let out = project(&volume, ViewMode::HorizontalSlice, 2).unwrap();

        assert_eq!(out.len(), h);
        for y0 in 0..h {
            let frame = out.get(y0).unwrap();
            // Rows are x, columns are t
            assert_eq!((frame.height(), frame.width()), (w, t));
            for x in 0..w {
                for ti in 0..t {
                    assert_eq!(frame.get(ti, x, 0), volume.get(ti, y0, x, 0));
                }
            }
        }
    }

    #[test]
    fn test_channels_pass_through() {
        let frames: Vec<Frame> = (0..3)
            .map(|t| Frame::from_fn(2, 2, 3, |x, y, c| (t * 100 + y * 10 + x) as f32 + c as f32 * 0.5).unwrap())
            .collect();
        let volume = SpaceTimeVolume::build(&frames).unwrap();
        let out = project(&volume, ViewMode::HorizontalSlice, 0).unwrap();

        // output[y=1], row x=0, column t=2
        assert_eq!(out.get(1).unwrap().pixel(2, 0), volume.pixel(2, 1, 0));
        assert_eq!(out.get(1).unwrap().pixel(2, 0), &[210.0, 210.5, 211.0]);
    }

    #[test]
    fn test_fixed_index_bounds() {
        let volume = coded_volume(4, 3, 5);

        assert!(project(&volume, ViewMode::VerticalSlice, 0).is_ok());
        assert!(project(&volume, ViewMode::VerticalSlice, 4).is_ok());
        assert_eq!(
            project(&volume, ViewMode::VerticalSlice, 5),
            Err(ProjectionError::IndexOutOfRange {
                mode: ViewMode::VerticalSlice,
                axis: Axis::Column,
                index: 5,
                extent: 5,
            })
        );

        assert!(project(&volume, ViewMode::HorizontalSlice, 2).is_ok());
        assert!(project(&volume, ViewMode::HorizontalSlice, 3).is_err());
    }

    #[test]
    fn test_default_fixed_index_is_midpoint() {
        let volume = coded_volume(4, 7, 10);
        assert_eq!(default_fixed_index(&volume, ViewMode::Spatial), 0);
        assert_eq!(default_fixed_index(&volume, ViewMode::VerticalSlice), 5);
        assert_eq!(default_fixed_index(&volume, ViewMode::HorizontalSlice), 3);
    }

    #[test]
    fn test_small_scenario() {
        // 4 frames of 2x2x1, pixel (y, x) of frame t = t*4 + y*2 + x
        let frames: Vec<Frame> = (0..4)
            .map(|t| Frame::from_fn(2, 2, 1, |x, y, _| (t * 4 + y * 2 + x) as f32).unwrap())
            .collect();
        let volume = SpaceTimeVolume::build(&frames).unwrap();

        let spatial = project(&volume, ViewMode::Spatial, 0).unwrap();
        // output[2][y=1][x=0]
        assert_eq!(spatial.get(2).unwrap().get(0, 1, 0), 10.0);

        let vertical = project(&volume, ViewMode::VerticalSlice, 1).unwrap();
        // output[x=1][y=1][t=2]
        assert_eq!(vertical.get(1).unwrap().get(2, 1, 0), 11.0);
    }

    proptest! {
        #[test]
        fn prop_slice_roundtrip(
            t in 1usize..7,
            h in 1usize..7,
            w in 1usize..7,
            seed in 0usize..1000,
        ) {
            let volume = coded_volume(t, h, w);

            let x0 = seed % w;
            let vertical = project(&volume, ViewMode::VerticalSlice, x0).unwrap();
            prop_assert_eq!(vertical.len(), w);
            let frame = vertical.get(x0).unwrap();
            for y in 0..h {
                for ti in 0..t {
                    prop_assert_eq!(frame.get(ti, y, 0), volume.get(ti, y, x0, 0));
                }
            }

            let y0 = seed % h;
            let horizontal = project(&volume, ViewMode::HorizontalSlice, y0).unwrap();
            prop_assert_eq!(horizontal.len(), h);
            let frame = horizontal.get(y0).unwrap();
            for x in 0..w {
                for ti in 0..t {
                    prop_assert_eq!(frame.get(ti, x, 0), volume.get(ti, y0, x, 0));
                }
            }
        }

        #[test]
        fn prop_out_of_range_rejected(
            h in 1usize..6,
            w in 1usize..6,
            over in 0usize..10,
        ) {
            let volume = coded_volume(2, h, w);
            prop_assert!(project(&volume, ViewMode::VerticalSlice, w + over).is_err());
            prop_assert!(project(&volume, ViewMode::HorizontalSlice, h + over).is_err());
            prop_assert!(project(&volume, ViewMode::VerticalSlice, w - 1).is_ok());
            prop_assert!(project(&volume, ViewMode::HorizontalSlice, h - 1).is_ok());
        }
    }
}
