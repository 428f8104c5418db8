//! Frame container - one 2D grid of multi-channel pixels.

use std::fmt;

use image::{GrayImage, RgbImage, RgbaImage};

/// Dimensions shared by every frame of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameShape {
    /// Pixels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Intensities per pixel.
    pub channels: usize,
}

impl FrameShape {
    /// Number of `f32` values in one frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height * self.channels
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// A frame of pixel intensities.
///
/// Data is stored row-major with interleaved channels:
/// `[(y * width + x) * channels + c]`. Frames decoded from 8-bit sources carry
/// intensities in `0.0..=255.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Vec<f32>,
    width: usize,
    height: usize,
    channels: usize,
}

impl Frame {
    /// Wrap raw interleaved data.
    ///
    /// Returns `None` if any dimension is zero or `data` has the wrong length.
    pub fn from_raw(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Option<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return None;
        }
        if data.len() != width * height * channels {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Build a frame by evaluating `f(x, y, channel)` for every sample.
    ///
    /// Returns `None` if any dimension is zero.
    pub fn from_fn<F>(width: usize, height: usize, channels: usize, mut f: F) -> Option<Self>
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height * channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    data.push(f(x, y, c));
                }
            }
        }
        Self::from_raw(width, height, channels, data)
    }

    /// Constructor for callers that already guarantee the invariants.
    pub(crate) fn from_parts(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height * channels);
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    /// Raw interleaved samples.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    /// Offset of pixel (x, y) in the raw data.
    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.channels
    }

    /// Value at column `x`, row `y`, channel `c`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[self.idx(x, y) + c]
    }

    /// All channels of pixel (x, y).
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let start = self.idx(x, y);
        &self.data[start..start + self.channels]
    }

    /// 8-bit RGB frame.
    pub fn from_rgb8(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| f32::from(v)).collect();
        Self::from_parts(width as usize, height as usize, 3, data)
    }

    /// 8-bit RGBA frame (alpha kept as a fourth channel).
    pub fn from_rgba8(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| f32::from(v)).collect();
        Self::from_parts(width as usize, height as usize, 4, data)
    }

    /// 8-bit greyscale frame.
    pub fn from_luma8(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| f32::from(v)).collect();
        Self::from_parts(width as usize, height as usize, 1, data)
    }

    /// Quantize to an 8-bit RGBA image.
    ///
    /// One channel is replicated to grey, two channels are read as grey+alpha,
    /// three are RGB with opaque alpha, four or more use the first four.
    pub fn to_rgba8(&self) -> RgbaImage {
        let mut out = Vec::with_capacity(self.width * self.height * 4);
        for px in self.data.chunks_exact(self.channels) {
            let rgba = match *px {
                [v] => [v, v, v, 255.0],
                [v, a] => [v, v, v, a],
                [r, g, b] => [r, g, b, 255.0],
                [r, g, b, a, ..] => [r, g, b, a],
                [] => [0.0, 0.0, 0.0, 255.0],
            };
            out.extend(rgba.into_iter().map(quantize));
        }
        // Dimensions always match the buffer length.
        RgbaImage::from_raw(self.width as u32, self.height as u32, out)
            .unwrap_or_else(|| RgbaImage::new(self.width as u32, self.height as u32))
    }
}

/// Round and clamp an intensity onto `0..=255`.
#[inline]
pub fn quantize(v: f32) -> u8 {
    if v.is_nan() {
        0
    } else {
        v.round().clamp(0.0, 255.0) as u8
    }
}
