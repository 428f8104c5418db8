//! Configuration types for playback and export.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ViewMode;

/// Playback rate used when a source carries no usable rate of its own.
pub const DEFAULT_FPS: f32 = 20.0;

/// Upper bound accepted for playback rates.
pub const MAX_FPS: f32 = 1000.0;

/// Slowest accepted rate: one frame every 1000 seconds.
pub const MIN_FPS: f32 = 0.001;

fn default_fps() -> f32 {
    DEFAULT_FPS
}

fn default_max_fps() -> f32 {
    MAX_FPS
}

fn default_autoplay() -> bool {
    true
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_speed() -> i32 {
    10
}

/// Top-level viewer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Playback loop parameters.
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Export parameters.
    #[serde(default)]
    pub export: ExportConfig,
    /// Stretch each channel to the full intensity range after loading.
    #[serde(default)]
    pub normalize_channels: bool,
}

/// Playback loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Frame rate used when the source has none (frames/second).
    #[serde(default = "default_fps")]
    pub fps: f32,
    /// Requested rates above this are clamped.
    #[serde(default = "default_max_fps")]
    pub max_fps: f32,
    /// View mode selected after a source is loaded.
    #[serde(default)]
    pub default_view: ViewMode,
    /// Start playing as soon as a source is loaded.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            max_fps: MAX_FPS,
            default_view: ViewMode::Spatial,
            autoplay: true,
        }
    }
}

/// Export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for exports named after the source and view.
    #[serde(default = "default_export_dir")]
    pub directory: PathBuf,
    /// Export rate. `None` uses the current playback rate.
    #[serde(default)]
    pub fps: Option<f32>,
    /// GIF quantizer speed (1 = best quality, 30 = fastest).
    #[serde(default = "default_speed")]
    pub speed: i32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
            fps: None,
            speed: default_speed(),
        }
    }
}

/// True for finite rates of at least [`MIN_FPS`].
#[inline]
pub fn is_valid_rate(fps: f32) -> bool {
    fps.is_finite() && fps >= MIN_FPS
}

impl ViewerConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let playback = &self.playback;
        if !is_valid_rate(playback.fps) {
            return Err(ConfigError::InvalidFrameRate(playback.fps));
        }
        if !is_valid_rate(playback.max_fps) || playback.max_fps < playback.fps {
            return Err(ConfigError::InvalidMaxFrameRate {
                fps: playback.fps,
                max_fps: playback.max_fps,
            });
        }
        if let Some(fps) = self.export.fps
            && !is_valid_rate(fps)
        {
            return Err(ConfigError::InvalidExportRate(fps));
        }
        if !(1..=30).contains(&self.export.speed) {
            return Err(ConfigError::InvalidEncoderSpeed(self.export.speed));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Playback frame rate must be finite and at least {min}, got {0}", min = MIN_FPS)]
    InvalidFrameRate(f32),
    #[error("Maximum frame rate {max_fps} must be valid and at least the playback rate {fps}")]
    InvalidMaxFrameRate { fps: f32, max_fps: f32 },
    #[error("Export frame rate must be finite and at least {min}, got {0}", min = MIN_FPS)]
    InvalidExportRate(f32),
    #[error("Encoder speed must be within 1..=30, got {0}")]
    InvalidEncoderSpeed(i32),
}
