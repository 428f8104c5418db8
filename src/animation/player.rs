//! Playback controller - state machine driving the re-sliced animation.
//!
//! The controller owns the loaded volume, the active view and the cursor into
//! its output sequence. Projections are computed eagerly whenever the view or
//! fixed index changes and swapped in as a whole, so a timer tick only
//! advances an index and hands a ready frame to the renderer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::Command;
use super::format::{export_path, frame_interval};
use super::recorder::{ExportEngine, ExportError, ExportStats, GifRecorder, RecorderConfig};
use super::source::{FrameSource, SourceError};
use crate::compute::{
    Frame, OutputSequence, ProjectionError, SpaceTimeVolume, VolumeError, default_fixed_index,
    project,
};
use crate::schema::{ViewMode, ViewerConfig, is_valid_rate};

/// Coarse controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No source loaded.
    Idle,
    /// Volume built and projected, not advancing.
    Ready,
    /// Advancing on the timer.
    Playing,
}

/// What a renderer is asked to show.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub frame: &'a Frame,
    /// Position in the output sequence.
    pub index: usize,
    /// Length of the output sequence.
    pub len: usize,
    pub mode: ViewMode,
    /// Normalised position of the displayed plane along the animation axis.
    pub plane_position: f32,
}

/// Receives frames pushed by the controller.
pub trait Renderer {
    fn present(&mut self, view: FrameView<'_>);
}

/// Renderer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn present(&mut self, _view: FrameView<'_>) {}
}

/// Result of handling one command.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// State was updated (or nothing needed to change).
    Continue,
    /// An export finished.
    Exported(ExportStats),
    /// The user asked to leave.
    Quit,
}

/// Everything derived from one loaded source.
struct Loaded {
    name: String,
    volume: Arc<SpaceTimeVolume>,
    output: Arc<OutputSequence>,
}

/// Playback controller with injected renderer and export engine.
///
/// Usage:
/// ```ignore
/// let mut player = PlaybackController::new(config, Box::new(NullRenderer));
/// player.load_from(&mut source)?;
/// player.set_view_mode(ViewMode::VerticalSlice)?;
/// player.play();
/// loop {
///     std::thread::sleep(player.interval());
///     player.tick();
/// }
/// ```
pub struct PlaybackController {
    config: ViewerConfig,
    renderer: Box<dyn Renderer>,
    exporter: Box<dyn ExportEngine>,
    loaded: Option<Loaded>,
    frame_index: usize,
    fps: f32,
    playing: bool,
}

impl PlaybackController {
    /// Create a controller exporting through a [`GifRecorder`].
    pub fn new(config: ViewerConfig, renderer: Box<dyn Renderer>) -> Self {
        let exporter = Box::new(GifRecorder::new(RecorderConfig::from(&config.export)));
        Self::with_exporter(config, renderer, exporter)
    }

    /// Create a controller with a custom export engine.
    pub fn with_exporter(
        config: ViewerConfig,
        renderer: Box<dyn Renderer>,
        exporter: Box<dyn ExportEngine>,
    ) -> Self {
        let fps = config.playback.fps;
        Self {
            config,
            renderer,
            exporter,
            loaded: None,
            frame_index: 0,
            fps,
            playing: false,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.loaded, self.playing) {
            (None, _) => PlaybackState::Idle,
            (Some(_), false) => PlaybackState::Ready,
            (Some(_), true) => PlaybackState::Playing,
        }
    }

    /// Current position in the output sequence.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn frame_rate(&self) -> f32 {
        self.fps
    }

    /// Timer interval for the current rate.
    pub fn interval(&self) -> Duration {
        frame_interval(self.fps)
    }

    pub fn view_mode(&self) -> Option<ViewMode> {
        self.loaded.as_ref().map(|l| l.output.mode())
    }

    pub fn fixed_index(&self) -> Option<usize> {
        self.loaded.as_ref().and_then(|l| l.output.fixed_index())
    }

    pub fn volume(&self) -> Option<&SpaceTimeVolume> {
        self.loaded.as_ref().map(|l| l.volume.as_ref())
    }

    /// Shared snapshot of the current output sequence.
    pub fn output(&self) -> Option<Arc<OutputSequence>> {
        self.loaded.as_ref().map(|l| Arc::clone(&l.output))
    }

    /// Name of the loaded source, used for export file names.
    pub fn source_name(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.name.as_str())
    }

    /// Frame at the cursor.
    pub fn current_frame(&self) -> Option<&Frame> {
        self.loaded
            .as_ref()
            .and_then(|l| l.output.get(self.frame_index))
    }

    /// Position of the displayed plane along the animation axis, in `0..=1`.
    pub fn plane_position(&self) -> f32 {
        match &self.loaded {
            Some(l) if l.output.len() > 1 => {
                self.frame_index as f32 / (l.output.len() - 1) as f32
            }
            _ => 0.0,
        }
    }

    /// Build a volume from `frames` and project it with the default view.
    ///
    /// On error the previously loaded source (if any) is left untouched.
    pub fn load_source(&mut self, frames: &[Frame]) -> Result<(), PlaybackError> {
        self.load_named("volume", frames)
    }

    /// Decode `source` and load its frames at the source's native rate.
    ///
    /// An unusable native rate falls back to the configured playback rate.
    pub fn load_from(&mut self, source: &mut dyn FrameSource) -> Result<(), PlaybackError> {
        let media = source.decode()?;
        self.load_named(&source.name(), &media.frames)?;
        if let Err(e) = self.set_frame_rate(media.fps) {
            let fallback = self.config.playback.fps;
            warn!("Ignoring source frame rate ({}), using {}", e, fallback);
            if self.set_frame_rate(fallback).is_err() {
                warn!("Configured frame rate {} is unusable, keeping {}", fallback, self.fps);
            }
        }
        Ok(())
    }

    fn load_named(&mut self, name: &str, frames: &[Frame]) -> Result<(), PlaybackError> {
        let mut volume = SpaceTimeVolume::build(frames)?;
        if self.config.normalize_channels {
            volume = volume.normalize_channels();
        }

        let (t, h, w, c) = volume.extents();
        info!(
            "Media dimensions: Time={}, Height={}, Width={}, Channels={}",
            t, h, w, c
        );

        let mode = self.config.playback.default_view;
        let output = project(&volume, mode, default_fixed_index(&volume, mode))?;

        self.loaded = Some(Loaded {
            name: name.to_string(),
            volume: Arc::new(volume),
            output: Arc::new(output),
        });
        self.frame_index = 0;
        self.playing = false;
        Ok(())
    }

    /// Switch view mode, projecting at the mode's default fixed index.
    ///
    /// Resets the cursor to 0 and keeps the playing/ready state.
    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), PlaybackError> {
        let loaded = self.loaded.as_mut().ok_or(PlaybackError::NoSource)?;
        let fixed = default_fixed_index(&loaded.volume, mode);
        let output = project(&loaded.volume, mode, fixed)?;

        loaded.output = Arc::new(output);
        self.frame_index = 0;
        debug!("View mode set to {} ({} frames)", mode, loaded.output.len());
        Ok(())
    }

    /// Select slice `index` along the fixed axis of the current view.
    ///
    /// In the slice views the cursor moves to the selected slice. The spatial
    /// view has no fixed axis, so the index is ignored there.
    pub fn set_fixed_index(&mut self, index: usize) -> Result<(), PlaybackError> {
        let loaded = self.loaded.as_mut().ok_or(PlaybackError::NoSource)?;
        let mode = loaded.output.mode();
        let output = project(&loaded.volume, mode, index)?;

        if let Some(fixed) = output.fixed_index() {
            self.frame_index = fixed;
        }
        loaded.output = Arc::new(output);
        Ok(())
    }

    /// Change the playback rate; applies from the next tick.
    ///
    /// Rates above the configured maximum are clamped.
    pub fn set_frame_rate(&mut self, fps: f32) -> Result<(), PlaybackError> {
        if !is_valid_rate(fps) {
            return Err(PlaybackError::InvalidRate(fps));
        }
        let max = self.config.playback.max_fps;
        self.fps = if fps > max {
            warn!("FPS capped at {}", max);
            max
        } else {
            fps
        };
        info!("FPS set to {:.1}", self.fps);
        Ok(())
    }

    /// Start advancing. Does nothing while idle.
    pub fn play(&mut self) {
        if self.loaded.is_some() {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Advance one frame and present it.
    ///
    /// Returns the new index, or `None` when not playing or nothing to show.
    pub fn tick(&mut self) -> Option<usize> {
        if !self.playing {
            return None;
        }
        let len = self.loaded.as_ref()?.output.len();
        if len == 0 {
            return None;
        }
        self.frame_index = (self.frame_index + 1) % len;
        self.refresh();
        Some(self.frame_index)
    }

    /// Present the frame at the cursor again.
    pub fn refresh(&mut self) {
        let plane_position = self.plane_position();
        let Some(loaded) = &self.loaded else {
            return;
        };
        if let Some(frame) = loaded.output.get(self.frame_index) {
            self.renderer.present(FrameView {
                frame,
                index: self.frame_index,
                len: loaded.output.len(),
                mode: loaded.output.mode(),
                plane_position,
            });
        }
    }

    /// Snapshot to hand to an exporter.
    pub fn export_snapshot(&self) -> Result<Arc<OutputSequence>, PlaybackError> {
        match &self.loaded {
            Some(l) if !l.output.is_empty() => Ok(Arc::clone(&l.output)),
            _ => Err(PlaybackError::NothingToExport),
        }
    }

    /// Default export destination for `fps`.
    pub fn default_export_path(&self, fps: f32) -> Result<PathBuf, PlaybackError> {
        let loaded = self.loaded.as_ref().ok_or(PlaybackError::NothingToExport)?;
        Ok(export_path(
            &self.config.export.directory,
            &loaded.name,
            loaded.output.mode(),
            fps,
        ))
    }

    /// Export rate to use when none is given.
    pub fn default_export_rate(&self) -> f32 {
        self.config.export.fps.unwrap_or(self.fps)
    }

    /// Export the current output sequence at `fps` to `destination`.
    ///
    /// Playback state is not touched.
    pub fn request_export(
        &self,
        fps: f32,
        destination: &Path,
    ) -> Result<ExportStats, PlaybackError> {
        let snapshot = self.export_snapshot()?;
        if !is_valid_rate(fps) {
            return Err(PlaybackError::InvalidRate(fps));
        }
        Ok(self.exporter.export(&snapshot, fps, destination)?)
    }

    /// Apply one user command.
    ///
    /// A rejected command leaves every piece of state as it was.
    pub fn handle(&mut self, command: Command) -> Result<Outcome, PlaybackError> {
        match command {
            Command::SetViewMode(mode) => self.set_view_mode(mode)?,
            Command::SetFixedIndex(index) => self.set_fixed_index(index)?,
            Command::SetFrameRate(fps) => self.set_frame_rate(fps)?,
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Toggle => self.toggle(),
            Command::Export { fps, path } => {
                let fps = fps.unwrap_or_else(|| self.default_export_rate());
                let path = match path {
                    Some(p) => p,
                    None => self.default_export_path(fps)?,
                };
                return Ok(Outcome::Exported(self.request_export(fps, &path)?));
            }
            Command::CancelExport => debug!("No background export to cancel"),
            Command::Quit => return Ok(Outcome::Quit),
        }
        Ok(Outcome::Continue)
    }
}

/// Playback errors.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("No source loaded")]
    NoSource,
    #[error("Frame rate must be finite and at least {min}, got {0}", min = crate::schema::MIN_FPS)]
    InvalidRate(f32),
    #[error("Nothing to export")]
    NothingToExport,
    #[error(transparent)]
    Volume(#[from] VolumeError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
