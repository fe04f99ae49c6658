//! Error types for wikisearch.
//!
//! Library crates use [`WikiSearchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all wikisearch operations.
#[derive(Debug, thiserror::Error)]
pub enum WikiSearchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Content store or document store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The indexing service refused a document.
    #[error("submission error: {0}")]
    Submission(String),

    /// A requested topic or document does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (malformed id, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WikiSearchError>;

impl WikiSearchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-found error describing the missing item.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
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
        let err = WikiSearchError::config("portal_url is empty");
        assert_eq!(err.to_string(), "config error: portal_url is empty");

        let err = WikiSearchError::not_found("topic 42");
        assert_eq!(err.to_string(), "not found: topic 42");

        let err = WikiSearchError::Submission("uid Home_wis rejected".into());
        assert!(err.to_string().contains("Home_wis"));
    }
}
