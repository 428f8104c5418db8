//! Animation recorder for exporting output sequences as GIF files.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use image::ImageError;
use image::codecs::gif::{GifEncoder, Repeat};
use log::{debug, info, warn};

use super::format::{MAX_GIF_FPS, frame_delay, partial_path};
use crate::compute::OutputSequence;
use crate::schema::{ExportConfig, is_valid_rate};

/// Anything that can write an output sequence to disk.
pub trait ExportEngine {
    /// Write `frames` in order at `fps` to `destination`.
    ///
    /// On error nothing is left at `destination`.
    fn export(
        &self,
        frames: &OutputSequence,
        fps: f32,
        destination: &Path,
    ) -> Result<ExportStats, ExportError>;
}

/// Configuration for GIF recording.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Quantizer speed (1 = best quality, 30 = fastest).
    pub speed: i32,
    /// Loop the animation forever.
    pub looping: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            speed: 10,
            looping: true,
        }
    }
}

impl From<&ExportConfig> for RecorderConfig {
    fn from(config: &ExportConfig) -> Self {
        Self {
            speed: config.speed,
            ..Default::default()
        }
    }
}

/// Progress update sent while exporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProgress {
    pub current_frame: usize,
    pub total_frames: usize,
    pub stage: ExportStage,
}

/// Export stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// Checking rate and frames.
    Validating,
    /// Writing frames.
    Encoding,
    /// Flushing and moving the file into place.
    Finalizing,
    /// Successfully finished.
    Complete,
}

/// GIF writer with cancellation and progress reporting.
///
/// Usage:
/// ```ignore
/// let recorder = GifRecorder::new(RecorderConfig::default());
/// let cancel = recorder.cancel_handle();
/// let stats = recorder.export(&sequence, 15.0, Path::new("out.gif"))?;
/// ```
pub struct GifRecorder {
    config: RecorderConfig,
    cancelled: Arc<AtomicBool>,
    progress: Option<Sender<ExportProgress>>,
}

impl GifRecorder {
    /// Create a new recorder.
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Send progress updates to `tx`.
    pub fn with_progress(mut self, tx: Sender<ExportProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn report(&self, current_frame: usize, total_frames: usize, stage: ExportStage) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(ExportProgress {
                current_frame,
                total_frames,
                stage,
            });
        }
    }

    fn check_cancelled(&self) -> Result<(), ExportError> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Encode every frame into `path`.
    fn write_gif(
        &self,
        frames: &OutputSequence,
        fps: f32,
        path: &Path,
    ) -> Result<u64, ExportError> {
        let total = frames.len();
        let mut writer = BufWriter::new(File::create(path)?);

        {
            let mut encoder = GifEncoder::new_with_speed(&mut writer, self.config.speed);
            if self.config.looping {
                encoder.set_repeat(Repeat::Infinite)?;
            }

            let delay = frame_delay(fps);
            for (i, frame) in frames.iter().enumerate() {
                self.check_cancelled()?;
                encoder.encode_frame(image::Frame::from_parts(frame.to_rgba8(), 0, 0, delay))?;
                self.report(i + 1, total, ExportStage::Encoding);
            }
            // Trailer is written when the encoder is dropped.
        }

        self.report(total, total, ExportStage::Finalizing);
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(file.metadata()?.len())
    }
}

impl ExportEngine for GifRecorder {
    fn export(
        &self,
        frames: &OutputSequence,
        fps: f32,
        destination: &Path,
    ) -> Result<ExportStats, ExportError> {
        let total = frames.len();
        self.report(0, total, ExportStage::Validating);

        if !is_valid_rate(fps) {
            return Err(ExportError::InvalidRate(fps));
        }
        if frames.is_empty() {
            return Err(ExportError::Empty);
        }
        let fps = if fps > MAX_GIF_FPS {
            warn!("GIF frame rate capped at {} (requested {})", MAX_GIF_FPS, fps);
            MAX_GIF_FPS
        } else {
            fps
        };
        self.check_cancelled()?;

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(destination);
        debug!(
            "Exporting {} frames of {} view to {:?}",
            total,
            frames.mode(),
            partial
        );

        let bytes = match self
            .write_gif(frames, fps, &partial)
            .and_then(|bytes| fs::rename(&partial, destination).map(|_| bytes).map_err(Into::into))
        {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial)
                    && rm.kind() != io::ErrorKind::NotFound
                {
                    warn!("Could not remove partial export {:?}: {}", partial, rm);
                }
                return Err(e);
            }
        };

        self.report(total, total, ExportStage::Complete);
        info!(
            "Export complete! Saved to {} at {:.1} FPS",
            destination.display(),
            fps
        );

        Ok(ExportStats {
            path: destination.to_path_buf(),
            frame_count: total,
            fps,
            total_bytes: bytes,
        })
    }
}

/// A GIF export running on its own thread.
pub struct ExportJob {
    cancel: Arc<AtomicBool>,
    progress: Receiver<ExportProgress>,
    handle: JoinHandle<Result<ExportStats, ExportError>>,
}

impl ExportJob {
    /// Export `frames` in the background.
    ///
    /// The sequence is a shared snapshot, so later view changes on the
    /// controller never affect what is written.
    pub fn spawn(
        config: RecorderConfig,
        frames: Arc<OutputSequence>,
        fps: f32,
        destination: PathBuf,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let recorder = GifRecorder::new(config).with_progress(tx);
        let cancel = recorder.cancel_handle();

        let handle = thread::spawn(move || recorder.export(&frames, fps, &destination));

        Self {
            cancel,
            progress: rx,
            handle,
        }
    }

    /// Ask the export to stop; the partial file is discarded.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Progress updates. Disconnects once the export thread has finished.
    pub fn progress(&self) -> &Receiver<ExportProgress> {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the export to finish.
    pub fn join(self) -> Result<ExportStats, ExportError> {
        self.handle.join().unwrap_or(Err(ExportError::Panicked))
    }
}

/// Statistics from a finished export.
#[derive(Debug, Clone)]
pub struct ExportStats {
    /// Written file.
    pub path: PathBuf,
    /// Frames written.
    pub frame_count: usize,
    /// Playback rate stored in the file.
    pub fps: f32,
    /// File size in bytes.
    pub total_bytes: u64,
}

impl std::fmt::Display for ExportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames at {:.1} FPS, {} bytes -> {}",
            self.frame_count,
            self.fps,
            self.total_bytes,
            self.path.display()
        )
    }
}

/// Export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export frame rate must be finite and at least {min}, got {0}", min = crate::schema::MIN_FPS)]
    InvalidRate(f32),
    #[error("Nothing to export: the output sequence is empty")]
    Empty,
    #[error("Export cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] ImageError),
    #[error("Export thread panicked")]
    Panicked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Frame, SpaceTimeVolume, project};
    use crate::schema::ViewMode;
    use image::AnimationDecoder;
    use image::codecs::gif::GifDecoder;
    use std::io::BufReader;
    use tempfile::tempdir;

    fn sequence(frames: usize) -> OutputSequence {
        let frames: Vec<Frame> = (0..frames)
            .map(|t| {
                Frame::from_fn(6, 4, 3, |x, y, c| match c {
                    0 => (t * 60) as f32,
                    1 => (y * 40) as f32,
                    _ => (x * 30) as f32,
                })
                .unwrap()
            })
            .collect();
        let volume = SpaceTimeVolume::build(&frames).unwrap();
        project(&volume, ViewMode::Spatial, 0).unwrap()
    }

    fn decode_gif(path: &Path) -> Vec<image::Frame> {
        let reader = BufReader::new(File::open(path).unwrap());
        GifDecoder::new(reader)
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
    }

    #[test]
    fn test_export_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.gif");
        let seq = sequence(3);

        let stats = GifRecorder::new(RecorderConfig::default())
            .export(&seq, 10.0, &path)
            .unwrap();
        assert_eq!(stats.frame_count, 3);
        assert!(stats.total_bytes > 0);
        assert!(path.exists());
        assert!(!partial_path(&path).exists());

        let decoded = decode_gif(&path);
        assert_eq!(decoded.len(), 3);
        for (frame, expected) in decoded.iter().zip(seq.iter()) {
            let (numer, denom) = frame.delay().numer_denom_ms();
            assert_eq!(numer / denom, 100);
            assert_eq!(frame.buffer(), &expected.to_rgba8());
        }
    }

    #[test]
    fn test_export_vertical_slice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/slices.gif");
        let frames: Vec<Frame> = (0..5)
            .map(|t| Frame::from_fn(3, 2, 1, |x, y, _| (t * 40 + y * 20 + x * 5) as f32).unwrap())
            .collect();
        let volume = SpaceTimeVolume::build(&frames).unwrap();
        let seq = project(&volume, ViewMode::VerticalSlice, 1).unwrap();

        GifRecorder::new(RecorderConfig::default())
            .export(&seq, 25.0, &path)
            .unwrap();

        let decoded = decode_gif(&path);
        assert_eq!(decoded.len(), 3);
        // H x T grid per frame
        assert_eq!(decoded[0].buffer().dimensions(), (5, 2));
        // output[x=2][y=1][t=4] = 4*40 + 1*20 + 2*5
        assert_eq!(decoded[2].buffer().get_pixel(4, 1).0, [190, 190, 190, 255]);
    }

    #[test]
    fn test_export_caps_rate_at_gif_resolution() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fast.gif");

        let stats = GifRecorder::new(RecorderConfig::default())
            .export(&sequence(2), 500.0, &path)
            .unwrap();
        assert_eq!(stats.fps, MAX_GIF_FPS);

        for frame in decode_gif(&path) {
            let (numer, denom) = frame.delay().numer_denom_ms();
            assert_eq!(numer / denom, 10);
        }
    }

    #[test]
    fn test_export_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gif");
        let recorder = GifRecorder::new(RecorderConfig::default());

        assert!(matches!(
            recorder.export(&sequence(2), 0.0, &path),
            Err(ExportError::InvalidRate(_))
        ));
        assert!(matches!(
            recorder.export(&sequence(2), -5.0, &path),
            Err(ExportError::InvalidRate(_))
        ));
        assert!(matches!(
            recorder.export(&sequence(2), 1e-30, &path),
            Err(ExportError::InvalidRate(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_cancelled_export_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cancelled.gif");
        let recorder = GifRecorder::new(RecorderConfig::default());
        recorder.cancel_handle().store(true, Ordering::Relaxed);

        let result = recorder.export(&sequence(4), 10.0, &path);
        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let dir = tempdir().unwrap();
        // A directory where the file should go
        let path = dir.path().join("taken.gif");
        fs::create_dir(partial_path(&path)).unwrap();

        let result = GifRecorder::new(RecorderConfig::default()).export(&sequence(2), 10.0, &path);
        assert!(matches!(result, Err(ExportError::Io(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_progress_stages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.gif");
        let (tx, rx) = crossbeam_channel::unbounded();

        GifRecorder::new(RecorderConfig::default())
            .with_progress(tx)
            .export(&sequence(3), 10.0, &path)
            .unwrap();

        let updates: Vec<ExportProgress> = rx.try_iter().collect();
        assert_eq!(updates.first().unwrap().stage, ExportStage::Validating);
        assert_eq!(updates.last().unwrap().stage, ExportStage::Complete);
        let encoded = updates
            .iter()
            .filter(|p| p.stage == ExportStage::Encoding)
            .count();
        assert_eq!(encoded, 3);
    }

    #[test]
    fn test_background_job() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.gif");

        let job = ExportJob::spawn(
            RecorderConfig::default(),
            Arc::new(sequence(3)),
            10.0,
            path.clone(),
        );
        let stats = job.join().unwrap();
        assert_eq!(stats.frame_count, 3);
        assert_eq!(decode_gif(&path).len(), 3);
    }
}
