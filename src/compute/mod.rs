//! Compute module - Volume construction and axis projection.

mod frame;
mod projection;
mod volume;

pub use frame::*;
pub use projection::*;
pub use volume::*;
