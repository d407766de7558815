//! Error types for the weft core.

use std::fmt;

/// The main error type for weft core operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A chain path was empty or contained an empty segment.
    EmptyChainPath {
        /// The offending path as written.
        path: String,
    },
    /// Poll-timer related error.
    Timer(TimerError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChainPath { path } => {
                write!(f, "Chain path '{path}' is empty or has an empty segment")
            }
            Self::Timer(err) => write!(f, "Timer error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timer(err) => Some(err),
            _ => None,
        }
    }
}

/// Poll-timer specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The timer ID is invalid or has already been cancelled.
    InvalidTimerId,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimerId => write!(f, "Invalid or expired timer ID"),
        }
    }
}

impl std::error::Error for TimerError {}

impl From<TimerError> for CoreError {
    fn from(err: TimerError) -> Self {
        Self::Timer(err)
    }
}

/// A specialized Result type for weft core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
