//! Error types for contentimport.
//!
//! Library crates use [`ImportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Generic message used when the fetch proxy fails without an error body.
pub const FETCH_FALLBACK_MESSAGE: &str = "Failed to fetch JSON from URL";

/// Top-level error type for all import operations.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The URL source could not be fetched (proxy or direct).
    #[error("{message}")]
    Fetch { message: String },

    /// Source text was not valid JSON.
    #[error("invalid JSON: {message}")]
    Parse { message: String },

    /// Source JSON was valid but not an array of records.
    #[error("{message}")]
    Shape { message: String },

    /// A chunk submission failed; the rest of the run is abandoned.
    #[error("chunk {chunk} failed: {message}")]
    ChunkSubmission { chunk: usize, message: String },

    /// An event arrived that the current run state cannot accept.
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error outside the fetch and submit paths (image downloads, client setup).
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Record-level validation error (missing field, bad slug, bad date).
    #[error("{message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ImportError>;

impl ImportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error from any displayable message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a shape error from any displayable message.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape {
            message: msg.into(),
        }
    }

    /// Create a chunk submission error for the 0-based `chunk` index.
    pub fn chunk(chunk: usize, msg: impl Into<String>) -> Self {
        Self::ChunkSubmission {
            chunk,
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
        let err = ImportError::config("missing import endpoint");
        assert_eq!(err.to_string(), "config error: missing import endpoint");

        let err = ImportError::chunk(1, "HTTP 502 Bad Gateway");
        assert_eq!(err.to_string(), "chunk 1 failed: HTTP 502 Bad Gateway");

        let err = ImportError::InvalidTransition {
            event: "start a run",
            state: "submitting",
        };
        assert_eq!(err.to_string(), "cannot start a run while submitting");
    }

    #[test]
    fn fetch_message_is_verbatim() {
        let err = ImportError::fetch("Remote host returned 404");
        assert_eq!(err.to_string(), "Remote host returned 404");
    }
}
