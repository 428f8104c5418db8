//! View modes - axis remappings of the space-time volume.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A non-channel axis of the space-time volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Frame number (T).
    Time,
    /// Image row (Y).
    Row,
    /// Image column (X).
    Column,
}

impl Axis {
    /// Position of this axis in a `[t, y, x]` coordinate.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::Time => 0,
            Axis::Row => 1,
            Axis::Column => 2,
        }
    }

    /// Single-letter label used in view names.
    pub const fn letter(self) -> char {
        match self {
            Axis::Time => 'T',
            Axis::Row => 'Y',
            Axis::Column => 'X',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Which volume axes a view mode lays out where.
///
/// Every non-channel axis appears exactly once among `frame`, `rows` and
/// `columns`. `fixed` names the axis held constant within one displayed frame;
/// for the slice views that is the axis being swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMapping {
    /// Axis swept by the animation (output frame index).
    pub frame: Axis,
    /// Axis laid out along display rows.
    pub rows: Axis,
    /// Axis laid out along display columns.
    pub columns: Axis,
    /// Axis selected by the fixed index, if the view has one.
    pub fixed: Option<Axis>,
}

impl AxisMapping {
    /// Map an output coordinate (frame, row, column) back to `[t, y, x]`.
    #[inline]
    pub fn volume_coords(&self, frame: usize, row: usize, column: usize) -> [usize; 3] {
        let mut coords = [0usize; 3];
        coords[self.frame.index()] = frame;
        coords[self.rows.index()] = row;
        coords[self.columns.index()] = column;
        coords
    }
}

/// The three fixed ways of looking at a space-time volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Native playback: X-Y plane, animated over T.
    #[default]
    #[serde(rename = "x-y-t")]
    Spatial,
    /// Y-T plane at a fixed column, animated over X.
    #[serde(rename = "y-t-x")]
    VerticalSlice,
    /// X-T plane at a fixed row, animated over Y.
    #[serde(rename = "t-x-y")]
    HorizontalSlice,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [
        ViewMode::Spatial,
        ViewMode::VerticalSlice,
        ViewMode::HorizontalSlice,
    ];

    /// Axis descriptor for this mode.
    pub const fn mapping(self) -> AxisMapping {
        match self {
            ViewMode::Spatial => AxisMapping {
                frame: Axis::Time,
                rows: Axis::Row,
                columns: Axis::Column,
                fixed: None,
            },
            ViewMode::VerticalSlice => AxisMapping {
                frame: Axis::Column,
                rows: Axis::Row,
                columns: Axis::Time,
                fixed: Some(Axis::Column),
            },
            ViewMode::HorizontalSlice => AxisMapping {
                frame: Axis::Row,
                rows: Axis::Column,
                columns: Axis::Time,
                fixed: Some(Axis::Row),
            },
        }
    }

    /// Display label, e.g. `Y-T-X`.
    pub const fn label(self) -> &'static str {
        match self {
            ViewMode::Spatial => "X-Y-T",
            ViewMode::VerticalSlice => "Y-T-X",
            ViewMode::HorizontalSlice => "T-X-Y",
        }
    }

    /// Caption for the frame at `index` of this view.
    pub fn frame_title(self, index: usize) -> String {
        match self {
            ViewMode::Spatial => format!("Frame {} (X-Y plane)", index),
            ViewMode::VerticalSlice => format!("X = {} (Y-T plane)", index),
            ViewMode::HorizontalSlice => format!("Y = {} (T-X plane)", index),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unknown view mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown view mode '{0}' (expected x-y-t, y-t-x or t-x-y)")]
pub struct ParseViewModeError(pub String);

impl FromStr for ViewMode {
    type Err = ParseViewModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x-y-t" | "xyt" | "spatial" => Ok(ViewMode::Spatial),
            "y-t-x" | "ytx" | "vertical" => Ok(ViewMode::VerticalSlice),
            "t-x-y" | "txy" | "horizontal" => Ok(ViewMode::HorizontalSlice),
            _ => Err(ParseViewModeError(s.to_string())),
        }
    }
}
