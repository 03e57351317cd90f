//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all supervisor failure modes.
///
/// Only [`AppError::Launch`] and [`AppError::Config`] ever reach a caller.
/// Read and write failures are converted into a single `died` notification
/// on the event bus; termination races and signal failures are logged.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The child process could not be spawned.
    Launch(String),
    /// Decode or I/O failure while reading the child's stdout.
    Read(String),
    /// Broken pipe, reset, or other I/O failure while writing the child's stdin.
    Write(String),
    /// The child was already gone when termination was requested.
    TerminationRace(String),
    /// Pause/resume signal delivery failure.
    Signal(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::Read(msg) => write!(f, "read: {msg}"),
            Self::Write(msg) => write!(f, "write: {msg}"),
            Self::TerminationRace(msg) => write!(f, "termination race: {msg}"),
            Self::Signal(msg) => write!(f, "signal: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
