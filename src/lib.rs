//! Spacetime slicer - replay a video along any pair of its space-time axes.
//!
//! A sequence of equally sized frames is stacked into a volume indexed by
//! `(time, y, x, channel)`. The volume can then be played back as usual, or
//! re-sliced so that time becomes a spatial axis: each output frame is a
//! plane at a fixed `x` (Y-T) or a fixed `y` (T-X), and the animation sweeps
//! through that axis instead of through time.
//!
//! # Architecture
//!
//! - `schema`: View modes, axis mappings and configuration
//! - `compute`: Frames, the space-time volume and axis projection
//! - `animation`: Frame sources, the playback controller and GIF export
//!
//! # Example
//!
//! ```rust,no_run
//! use spacetime_slicer::{
//!     animation::{NullRenderer, PlaybackController, open_source},
//!     schema::{ViewMode, ViewerConfig},
//! };
//!
//! let config = ViewerConfig::default();
//! let mut source = open_source("clip.gif", &config.playback).unwrap();
//!
//! let mut player = PlaybackController::new(config, Box::new(NullRenderer));
//! player.load_from(source.as_mut()).unwrap();
//! player.set_view_mode(ViewMode::VerticalSlice).unwrap();
//!
//! let fps = player.frame_rate();
//! let dest = player.default_export_path(fps).unwrap();
//! let stats = player.request_export(fps, &dest).unwrap();
//! println!("Exported {}", stats);
//! ```

pub mod animation;
pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use animation::{PlaybackController, PlaybackError};
pub use compute::{Frame, OutputSequence, SpaceTimeVolume, project};
pub use schema::{ViewMode, ViewerConfig};
