//! Error types for ethicsgen.
//!
//! Library crates use [`EthicsGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ethicsgen operations.
#[derive(Debug, thiserror::Error)]
pub enum EthicsGenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to CommonCrawl or the model endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// Archive, HTML, or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad record, invalid training example, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The model endpoint accepted the request but generation failed.
    #[error("generation error: {0}")]
    Generation(String),

    /// The model answered, but the reasoning sections could not be located.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EthicsGenError>;

impl EthicsGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
