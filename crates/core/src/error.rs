//! Error types for the codechat workspace.
//!
//! `AppError` carries the cause of a failure (configuration, search, LLM,
//! prompt, evaluation, ...). Component operations wrap whatever they catch
//! into [`AppError::Wrapped`], which adds the `file:line` of the operation
//! that caught it. Callers only ever see that single wrapped kind and can
//! reach the original cause through [`AppError::root_cause`].

use std::fmt;
use std::panic::Location;

use thiserror::Error;

/// Unified error type for codechat.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Completion endpoint errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Search service errors and invalid search input
    #[error("Search error: {0}")]
    Search(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Feedback scoring and recording errors
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A failure caught by a component operation, tagged with where it was caught.
    #[error("Error occurred at [{location}]: {source}")]
    Wrapped {
        location: ErrorLocation,
        #[source]
        source: Box<AppError>,
    },
}

/// Source position at which an error was wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    pub file: &'static str,
    pub line: u32,
}

impl ErrorLocation {
    /// Location of the caller of the `#[track_caller]` function that invoked this.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl AppError {
    /// Wrap this error with the caller's source location.
    ///
    /// An error that is already wrapped is returned untouched so the
    /// innermost location survives repeated wrapping.
    #[track_caller]
    pub fn wrap(self) -> Self {
        match self {
            wrapped @ AppError::Wrapped { .. } => wrapped,
            other => AppError::Wrapped {
                location: ErrorLocation::caller(),
                source: Box::new(other),
            },
        }
    }

    /// Whether this is the wrapped kind surfaced by component operations.
    pub fn is_wrapped(&self) -> bool {
        matches!(self, AppError::Wrapped { .. })
    }

    /// Location marker of a wrapped error.
    pub fn location(&self) -> Option<ErrorLocation> {
        match self {
            AppError::Wrapped { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// The original cause, looking through any wrapping.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::Wrapped { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Extension for wrapping the error side of a `Result` at a component boundary.
pub trait ResultExt<T> {
    /// Wrap any error with the caller's location (see [`AppError::wrap`]).
    fn wrap_err(self) -> AppResult<T>;
}

impl<T> ResultExt<T> for AppResult<T> {
    #[track_caller]
    fn wrap_err(self) -> AppResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(err.wrap()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
