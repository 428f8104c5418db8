//! Container formats, frame timing and export naming.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::Delay;

use crate::schema::{MIN_FPS, ViewMode, is_valid_rate};

/// Extension of exported animations.
pub const EXPORT_EXTENSION: &str = "gif";

/// Extensions decoded as video through ffmpeg.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v", "mpg", "mpeg"];

/// Container families understood by the frame sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Animated (or single-frame) GIF.
    Gif,
    /// PNG, animated if it carries an APNG control chunk.
    Png,
    /// WebP, animated or still.
    WebP,
    /// Any other still image format.
    Still,
    /// Video container, decoded through ffmpeg.
    Video,
}

impl SourceKind {
    /// Guess the container from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gif" => Some(SourceKind::Gif),
            "png" | "apng" => Some(SourceKind::Png),
            "webp" => Some(SourceKind::WebP),
            "jpg" | "jpeg" | "bmp" => Some(SourceKind::Still),
            e if VIDEO_EXTENSIONS.contains(&e) => Some(SourceKind::Video),
            _ => None,
        }
    }
}

/// Frame rate implied by a list of per-frame delays in milliseconds.
///
/// Uses the mean delay; returns `None` when no delay is positive.
pub fn fps_from_delays(delays_ms: &[f64]) -> Option<f32> {
    let positive: Vec<f64> = delays_ms.iter().copied().filter(|d| *d > 0.0).collect();
    if positive.is_empty() {
        return None;
    }
    let mean = positive.iter().sum::<f64>() / positive.len() as f64;
    Some((1000.0 / mean) as f32)
}

/// Accept a detected rate only if it is valid and at most `max_fps`.
pub fn sanitize_fps(detected: Option<f32>, fallback: f32, max_fps: f32) -> f32 {
    match detected {
        Some(fps) if is_valid_rate(fps) && fps <= max_fps => fps,
        _ => fallback,
    }
}

/// Fastest rate a GIF can store: delays are whole hundredths of a second.
pub const MAX_GIF_FPS: f32 = 100.0;

/// Per-frame display time for `fps`.
///
/// Rates below [`MIN_FPS`] (and NaN) are treated as [`MIN_FPS`].
pub fn frame_interval(fps: f32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(MIN_FPS)))
}

/// Per-frame GIF delay for `fps`.
///
/// The encoder rounds the delay to hundredths of a second, so 30 fps plays
/// back at about 33.3 fps. Callers cap the rate at [`MAX_GIF_FPS`] first.
pub fn frame_delay(fps: f32) -> Delay {
    Delay::from_saturating_duration(frame_interval(fps))
}

/// Export file name: `<stem>_<view>_<fps>fps.gif`, e.g. `clip_y-t-x_20fps.gif`.
pub fn export_file_name(stem: &str, mode: ViewMode, fps: f32) -> String {
    format!(
        "{}_{}_{}fps.{}",
        stem,
        mode.label().to_lowercase(),
        fps.trunc() as u32,
        EXPORT_EXTENSION
    )
}

/// Export path inside `dir` for a source called `stem`.
pub fn export_path(dir: &Path, stem: &str, mode: ViewMode, fps: f32) -> PathBuf {
    dir.join(export_file_name(stem, mode, fps))
}

/// Sibling path an export is written to before it is renamed into place.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a/b.GIF")), Some(SourceKind::Gif));
        assert_eq!(SourceKind::from_path(Path::new("x.png")), Some(SourceKind::Png));
        assert_eq!(SourceKind::from_path(Path::new("x.webp")), Some(SourceKind::WebP));
        assert_eq!(SourceKind::from_path(Path::new("x.jpeg")), Some(SourceKind::Still));
        assert_eq!(SourceKind::from_path(Path::new("x.mp4")), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_path(Path::new("x.txt")), None);
        assert_eq!(SourceKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_fps_from_delays() {
        assert_eq!(fps_from_delays(&[100.0, 100.0]), Some(10.0));
        assert_eq!(fps_from_delays(&[0.0, 50.0]), Some(20.0));
        assert_eq!(fps_from_delays(&[0.0]), None);
        assert_eq!(fps_from_delays(&[]), None);
    }

    #[test]
    fn test_sanitize_fps() {
        assert_eq!(sanitize_fps(Some(29.97), 20.0, 1000.0), 29.97);
        assert_eq!(sanitize_fps(Some(0.0), 20.0, 1000.0), 20.0);
        assert_eq!(sanitize_fps(Some(5000.0), 20.0, 1000.0), 20.0);
        assert_eq!(sanitize_fps(Some(f32::NAN), 20.0, 1000.0), 20.0);
        assert_eq!(sanitize_fps(None, 20.0, 1000.0), 20.0);
    }

    #[test]
    fn test_frame_delay() {
        let (numer, denom) = frame_delay(10.0).numer_denom_ms();
        assert_eq!(numer / denom, 100);
        assert_eq!(frame_interval(4.0), Duration::from_millis(250));
    }

    #[test]
    fn test_frame_interval_tiny_rates() {
        assert_eq!(frame_interval(MIN_FPS), frame_interval(1e-30));
        assert_eq!(frame_interval(f32::NAN), frame_interval(MIN_FPS));
        assert!(frame_interval(MIN_FPS) <= Duration::from_secs(1001));
        assert_eq!(frame_interval(f32::INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_export_naming() {
        assert_eq!(
            export_file_name("clip", ViewMode::VerticalSlice, 24.9),
            "clip_y-t-x_24fps.gif"
        );
        assert_eq!(
            export_path(Path::new("exports"), "clip", ViewMode::Spatial, 20.0),
            PathBuf::from("exports/clip_x-y-t_20fps.gif")
        );
        assert_eq!(
            partial_path(Path::new("out/a.gif")),
            PathBuf::from("out/a.gif.partial")
        );
    }
}
