//! Error types for versefetch.
//!
//! Library crates use [`VerseFetchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-key fetch failures never appear here: the worker pool degrades them to
//! "missing" outcomes and the run continues.

use std::path::PathBuf;

/// Top-level error type for all versefetch operations.
#[derive(Debug, thiserror::Error)]
pub enum VerseFetchError {
    /// Configuration loading or validation error, including invalid selectors
    /// and URL templates. Fatal: the run does not start.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP client construction error.
    #[error("network error: {0}")]
    Network(String),

    /// Persistence layer error (serialization, atomic replace).
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (keyspace bounds, rule set invariants, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VerseFetchError>;

impl VerseFetchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = VerseFetchError::config("count table is empty");
        assert_eq!(err.to_string(), "config error: count table is empty");

        let err = VerseFetchError::validation("key 3:9 outside keyspace");
        assert!(err.to_string().contains("3:9"));
    }

    #[test]
    fn io_error_carries_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = VerseFetchError::io("/tmp/records.json", source);
        let msg = err.to_string();
        assert!(msg.contains("records.json"));
        assert!(msg.contains("denied"));
    }
}
