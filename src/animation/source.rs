//! Frame sources - decoding containers into ordered frame sequences.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageError};
use log::{debug, info};

use super::format::{SourceKind, fps_from_delays, sanitize_fps};
use crate::compute::Frame;
use crate::schema::PlaybackConfig;

/// Frames decoded from a source, with the rate they were meant to play at.
#[derive(Debug, Clone)]
pub struct DecodedMedia {
    /// Frames in presentation order.
    pub frames: Vec<Frame>,
    /// Native playback rate (frames/second).
    pub fps: f32,
}

/// Anything that can hand over an ordered sequence of equally-shaped frames.
pub trait FrameSource {
    /// Short name used for export file names.
    fn name(&self) -> String {
        "volume".to_string()
    }

    /// Decode every frame.
    fn decode(&mut self) -> Result<DecodedMedia, SourceError>;
}

/// Frames already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    frames: Vec<Frame>,
    fps: f32,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>, fps: f32) -> Self {
        Self {
            name: name.into(),
            frames,
            fps,
        }
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn decode(&mut self) -> Result<DecodedMedia, SourceError> {
        Ok(DecodedMedia {
            frames: self.frames.clone(),
            fps: self.fps,
        })
    }
}

/// Animated or still image decoded with the `image` crate.
///
/// GIF, APNG and animated WebP frames are fully composited and converted to
/// RGB. Still images yield a single frame.
#[derive(Debug, Clone)]
pub struct ImageSource {
    path: PathBuf,
    kind: SourceKind,
    default_fps: f32,
    max_fps: f32,
}

impl ImageSource {
    pub fn new<P: AsRef<Path>>(path: P, playback: &PlaybackConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let kind = SourceKind::from_path(&path).unwrap_or(SourceKind::Still);
        Self {
            path,
            kind,
            default_fps: playback.fps,
            max_fps: playback.max_fps,
        }
    }

    fn reader(&self) -> io::Result<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }

    fn decode_still(&self) -> Result<DecodedMedia, SourceError> {
        let image = image::open(&self.path)?;
        Ok(DecodedMedia {
            frames: vec![Frame::from_rgb8(&image.to_rgb8())],
            fps: self.default_fps,
        })
    }

    fn finish(&self, (frames, delays): (Vec<Frame>, Vec<f64>)) -> DecodedMedia {
        let fps = sanitize_fps(fps_from_delays(&delays), self.default_fps, self.max_fps);
        DecodedMedia { frames, fps }
    }
}

impl FrameSource for ImageSource {
    fn name(&self) -> String {
        source_stem(&self.path)
    }

    fn decode(&mut self) -> Result<DecodedMedia, SourceError> {
        debug!("Decoding {:?} as {:?}", self.path, self.kind);

        let media = match self.kind {
            SourceKind::Gif => {
                let decoder = GifDecoder::new(self.reader()?)?;
                self.finish(collect_animation(decoder)?)
            }
            SourceKind::Png => {
                let decoder = PngDecoder::new(self.reader()?)?;
                if decoder.is_apng()? {
                    self.finish(collect_animation(decoder.apng()?)?)
                } else {
                    self.decode_still()?
                }
            }
            SourceKind::WebP => {
                let decoder = WebPDecoder::new(self.reader()?)?;
                if decoder.has_animation() {
                    self.finish(collect_animation(decoder)?)
                } else {
                    self.decode_still()?
                }
            }
            SourceKind::Still => self.decode_still()?,
            SourceKind::Video => {
                return Err(SourceError::Unsupported(format!(
                    "{} is a video; use VideoSource",
                    self.path.display()
                )));
            }
        };

        if media.frames.is_empty() {
            return Err(SourceError::NoFrames(self.path.clone()));
        }
        Ok(media)
    }
}

/// Drain an animation decoder into RGB frames and per-frame delays (ms).
fn collect_animation<'a, D>(decoder: D) -> Result<(Vec<Frame>, Vec<f64>), SourceError>
where
    D: AnimationDecoder<'a>,
{
    let mut frames = Vec::new();
    let mut delays = Vec::new();
    for frame in decoder.into_frames() {
        let frame = frame?;
        let (numer, denom) = frame.delay().numer_denom_ms();
        if denom > 0 {
            delays.push(f64::from(numer) / f64::from(denom));
        }
        let rgb = image::DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
        frames.push(Frame::from_rgb8(&rgb));
    }
    Ok((frames, delays))
}

/// Video decoded by piping raw RGB frames out of `ffmpeg`.
#[derive(Debug, Clone)]
pub struct VideoSource {
    path: PathBuf,
    default_fps: f32,
    max_fps: f32,
}

impl VideoSource {
    pub fn new<P: AsRef<Path>>(path: P, playback: &PlaybackConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            default_fps: playback.fps,
            max_fps: playback.max_fps,
        }
    }
}

impl FrameSource for VideoSource {
    fn name(&self) -> String {
        source_stem(&self.path)
    }

    #[cfg(feature = "media-ffmpeg")]
    fn decode(&mut self) -> Result<DecodedMedia, SourceError> {
        let probe = ffmpeg::probe(&self.path)?;
        let frames = ffmpeg::decode_rgb24(&self.path, probe.width, probe.height)?;
        if frames.is_empty() {
            return Err(SourceError::NoFrames(self.path.clone()));
        }
        Ok(DecodedMedia {
            frames,
            fps: sanitize_fps(probe.fps, self.default_fps, self.max_fps),
        })
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    fn decode(&mut self) -> Result<DecodedMedia, SourceError> {
        let _ = (self.default_fps, self.max_fps);
        Err(SourceError::Unsupported(format!(
            "{}: video sources require the 'media-ffmpeg' feature",
            self.path.display()
        )))
    }
}

#[cfg(feature = "media-ffmpeg")]
mod ffmpeg {
    use std::path::Path;
    use std::process::Command;

    use super::SourceError;
    use crate::compute::Frame;

    pub struct Probe {
        pub width: usize,
        pub height: usize,
        pub fps: Option<f32>,
    }

    /// Read stream dimensions and frame rate with `ffprobe`.
    pub fn probe(path: &Path) -> Result<Probe, SourceError> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<usize>,
            height: Option<usize>,
            r_frame_rate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
        }

        let out = Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()?;
        if !out.status.success() {
            return Err(SourceError::Ffmpeg(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| SourceError::Ffmpeg(format!("ffprobe json parse failed: {e}")))?;
        let stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| SourceError::Ffmpeg("no video stream found".to_string()))?;

        match (stream.width, stream.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Probe {
                width,
                height,
                fps: stream.r_frame_rate.as_deref().and_then(parse_ratio),
            }),
            _ => Err(SourceError::Ffmpeg(
                "missing video dimensions from ffprobe".to_string(),
            )),
        }
    }

    /// Decode every frame as packed RGB.
    pub fn decode_rgb24(path: &Path, width: usize, height: usize) -> Result<Vec<Frame>, SourceError> {
        let out = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .output()?;
        if !out.status.success() {
            return Err(SourceError::Ffmpeg(format!(
                "ffmpeg decode failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let frame_len = width * height * 3;
        if !out.stdout.len().is_multiple_of(frame_len) {
            return Err(SourceError::Ffmpeg(format!(
                "decoded video has invalid size: got {} bytes, expected multiples of {}",
                out.stdout.len(),
                frame_len
            )));
        }

        Ok(out
            .stdout
            .chunks_exact(frame_len)
            .map(|chunk| {
                let data = chunk.iter().map(|&v| f32::from(v)).collect();
                Frame::from_parts(width, height, 3, data)
            })
            .collect())
    }

    /// Parse an ffmpeg rational such as `30000/1001`.
    pub fn parse_ratio(s: &str) -> Option<f32> {
        let (num, den) = s.split_once('/')?;
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        (den != 0.0).then(|| (num / den) as f32)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_ratio() {
            assert_eq!(parse_ratio("25/1"), Some(25.0));
            assert!((parse_ratio("30000/1001").unwrap() - 29.97).abs() < 1e-2);
            assert_eq!(parse_ratio("0/0"), None);
            assert_eq!(parse_ratio("abc"), None);
        }
    }
}

/// Open the right source for `path`, judged by its extension.
pub fn open_source<P: AsRef<Path>>(
    path: P,
    playback: &PlaybackConfig,
) -> Result<Box<dyn FrameSource>, SourceError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SourceError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    match SourceKind::from_path(path) {
        Some(SourceKind::Video) => {
            info!("Opening {} as video", path.display());
            Ok(Box::new(VideoSource::new(path, playback)))
        }
        Some(_) => {
            info!("Opening {} as image", path.display());
            Ok(Box::new(ImageSource::new(path, playback)))
        }
        None => Err(SourceError::Unsupported(format!(
            "unrecognised file extension: {}",
            path.display()
        ))),
    }
}

/// File stem of `path`, or `volume` when it has none.
pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("volume")
        .to_string()
}

/// Frame source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Decode error: {0}")]
    Decode(#[from] ImageError),
    #[error("Unsupported source: {0}")]
    Unsupported(String),
    #[error("No frames could be decoded from {}", .0.display())]
    NoFrames(PathBuf),
    #[error("ffmpeg error: {0}")]
    Ffmpeg(String),
}
