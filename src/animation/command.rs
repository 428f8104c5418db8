//! User intents delivered to the playback controller.

use std::path::PathBuf;
use std::str::FromStr;

use crate::schema::{ParseViewModeError, ViewMode};

/// One discrete user intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Switch the active view mode.
    SetViewMode(ViewMode),
    /// Select a slice along the fixed axis.
    SetFixedIndex(usize),
    /// Change the playback rate.
    SetFrameRate(f32),
    Play,
    Pause,
    /// Toggle between playing and paused.
    Toggle,
    /// Export the current output sequence. `None` fields use configured defaults.
    Export {
        fps: Option<f32>,
        path: Option<PathBuf>,
    },
    /// Abort a running background export.
    CancelExport,
    Quit,
}

/// Command line that could not be understood.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("Command '{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error(transparent)]
    ViewMode(#[from] ParseViewModeError),
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, CommandParseError> {
    s.parse()
        .map_err(|_| CommandParseError::InvalidNumber(s.to_string()))
}

impl FromStr for Command {
    type Err = CommandParseError;

    /// Parse lines such as `view y-t-x`, `fps 30`, `index 12` or
    /// `export 15 out.gif`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(CommandParseError::Empty)?;
        let arg = words.next();

        match head.to_ascii_lowercase().as_str() {
            "view" | "mode" => {
                let label = arg.ok_or(CommandParseError::MissingArgument("view"))?;
                Ok(Command::SetViewMode(label.parse()?))
            }
            "index" | "slice" => {
                let n = arg.ok_or(CommandParseError::MissingArgument("index"))?;
                Ok(Command::SetFixedIndex(parse_number(n)?))
            }
            "fps" | "rate" => {
                let n = arg.ok_or(CommandParseError::MissingArgument("fps"))?;
                Ok(Command::SetFrameRate(parse_number(n)?))
            }
            "play" => Ok(Command::Play),
            "pause" | "stop" => Ok(Command::Pause),
            "toggle" | "space" => Ok(Command::Toggle),
            "export" => {
                // Either argument may be omitted; a number is the rate.
                let mut fps = None;
                let mut path = None;
                for word in arg.into_iter().chain(words) {
                    match word.parse::<f32>() {
                        Ok(v) if fps.is_none() => fps = Some(v),
                        _ => path = Some(PathBuf::from(word)),
                    }
                }
                Ok(Command::Export { fps, path })
            }
            "cancel" => Ok(Command::CancelExport),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(CommandParseError::Unknown(head.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "view t-x-y".parse::<Command>(),
            Ok(Command::SetViewMode(ViewMode::HorizontalSlice))
        );
        assert_eq!("index 7".parse::<Command>(), Ok(Command::SetFixedIndex(7)));
        assert_eq!("  FPS 12.5 ".parse::<Command>(), Ok(Command::SetFrameRate(12.5)));
        assert_eq!("toggle".parse::<Command>(), Ok(Command::Toggle));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_export() {
        assert_eq!(
            "export".parse::<Command>(),
            Ok(Command::Export {
                fps: None,
                path: None
            })
        );
        assert_eq!(
            "export 15 out/a.gif".parse::<Command>(),
            Ok(Command::Export {
                fps: Some(15.0),
                path: Some(PathBuf::from("out/a.gif"))
            })
        );
        assert_eq!(
            "export b.gif".parse::<Command>(),
            Ok(Command::Export {
                fps: None,
                path: Some(PathBuf::from("b.gif"))
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandParseError::Empty));
        assert_eq!(
            "jump".parse::<Command>(),
            Err(CommandParseError::Unknown("jump".to_string()))
        );
        assert_eq!(
            "fps".parse::<Command>(),
            Err(CommandParseError::MissingArgument("fps"))
        );
        assert_eq!(
            "index -1".parse::<Command>(),
            Err(CommandParseError::InvalidNumber("-1".to_string()))
        );
        assert!(matches!(
            "view sideways".parse::<Command>(),
            Err(CommandParseError::ViewMode(_))
        ));
    }
}
