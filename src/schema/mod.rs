//! Schema module - Configuration and view-mode types for the slicer.

mod config;
mod view;

pub use config::*;
pub use view::*;
