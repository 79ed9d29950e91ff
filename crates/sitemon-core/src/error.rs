//! Error types for the sitemap monitor
//!
//! This module defines all error types used throughout the crate.

use std::fmt;
use thiserror::Error;

/// Result type alias for sitemap monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a monitor check cycle, used to tag orchestrator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    Fetching,
    Comparing,
    Notifying,
    Persisting,
    UpdatingMetadata,
}

impl fmt::Display for CheckStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckStage::Fetching => "fetching",
            CheckStage::Comparing => "comparing",
            CheckStage::Notifying => "notifying",
            CheckStage::Persisting => "persisting",
            CheckStage::UpdatingMetadata => "updating metadata",
        };
        f.write_str(name)
    }
}

/// Core error type for the sitemap monitor
#[derive(Error, Debug)]
pub enum Error {
    /// Every retrieval path was exhausted or yielded non-sitemap content
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Malformed XML or an unrecognized sitemap shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Resolution of a sitemap (possibly an index) produced no URLs
    #[error("{0}")]
    Resolve(String),

    /// Store collaborator errors
    #[error("Store error: {0}")]
    Store(String),

    /// Notification collaborator errors
    #[error("Notification error: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Monitor not found
    #[error("Monitor not found: {0}")]
    NotFound(String),

    /// A check cycle aborted at the given stage
    #[error("Check failed while {stage}: {message}")]
    Check {
        /// Stage that failed
        stage: CheckStage,
        /// Underlying error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a resolve error
    pub fn resolve(msg: impl Into<String>) -> Self {
        Self::Resolve(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a check-cycle error tagged with the failing stage
    pub fn check(stage: CheckStage, err: impl fmt::Display) -> Self {
        Self::Check {
            stage,
            message: err.to_string(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_error_names_the_stage() {
        let err = Error::check(CheckStage::Persisting, Error::store("disk full"));
        assert_eq!(
            err.to_string(),
            "Check failed while persisting: Store error: disk full"
        );
    }

    #[test]
    fn resolve_error_is_displayed_verbatim() {
        let err = Error::resolve("Failed to fetch sitemap: Invalid URL format");
        assert_eq!(err.to_string(), "Failed to fetch sitemap: Invalid URL format");
    }
}
