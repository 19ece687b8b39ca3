#![forbid(unsafe_code)]

//! Driver error type.

use std::fmt;
use std::io;

use termio_core::event::KeyCode;

/// Errors surfaced by the driver API.
///
/// Environment failures during [`init`](crate::ConsoleDriver::init) never
/// appear here; the driver degrades to headless mode instead.
#[derive(Debug)]
pub enum DriverError {
    /// Writing to or reading from the terminal failed.
    Io(io::Error),
    /// The driver was used before [`init`](crate::ConsoleDriver::init).
    NotInitialized,
    /// A simulated key whose code and character disagree, or that has no
    /// meaning on its own.
    InvalidKey { key: KeyCode, ch: char },
    /// A simulated mouse sample outside the screen.
    OutOfBounds { x: u16, y: u16, cols: u16, rows: u16 },
    /// `init` or `setup` called twice.
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, DriverError>;

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "terminal I/O error: {err}"),
            Self::NotInitialized => f.write_str("driver is not initialized"),
            Self::InvalidKey { key, ch } => {
                write!(f, "invalid simulated key {key:?} with character {ch:?}")
            }
            Self::OutOfBounds { x, y, cols, rows } => {
                write!(f, "mouse position ({x}, {y}) is outside the {cols}x{rows} screen")
            }
            Self::AlreadyRunning => f.write_str("driver is already running"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_errors_keep_their_source() {
        let err = DriverError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn out_of_bounds_names_the_screen() {
        let err = DriverError::OutOfBounds {
            x: 90,
            y: 3,
            cols: 80,
            rows: 24,
        };
        assert_eq!(
            err.to_string(),
            "mouse position (90, 3) is outside the 80x24 screen"
        );
        assert!(err.source().is_none());
    }
}
