//! Decoding, playback and GIF export of re-sliced animations.
//!
//! Frames enter through a [`FrameSource`] (animated GIF/PNG/WebP, a still
//! image, or video through ffmpeg), are turned into a volume and projected
//! by the [`PlaybackController`], and leave through an [`ExportEngine`].
//!
//! Exports are written next to their destination first and renamed into
//! place once complete:
//!
//! ```text
//! exports/
//!   clip_y-t-x_20fps.gif.partial   while encoding
//!   clip_y-t-x_20fps.gif           after the final rename
//! ```

mod command;
pub mod format;
mod player;
mod recorder;
mod source;

pub use command::{Command, CommandParseError};
pub use format::SourceKind;
pub use player::{
    FrameView, NullRenderer, Outcome, PlaybackController, PlaybackError, PlaybackState, Renderer,
};
pub use recorder::{
    ExportEngine, ExportError, ExportJob, ExportProgress, ExportStage, ExportStats, GifRecorder,
    RecorderConfig,
};
pub use source::{
    DecodedMedia, FrameSource, ImageSource, MemorySource, SourceError, VideoSource, open_source,
    source_stem,
};
