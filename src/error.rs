//! Error types for typeahead.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation.

use crate::types::Category;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Failures reported by the remote search capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The category has no query endpoint. Triggers the bulk-fetch fallback.
    #[error("No search endpoint for category '{category}'")]
    NotFound { category: Category },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Outcome of a failed [`SearchExecutor`](crate::services::SearchExecutor) run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// Cancelled before a result could be produced. Never retried or reported.
    #[error("Search aborted")]
    Aborted,

    /// Retryable failure.
    #[error("Search failed: {0}")]
    Failed(#[from] BackendError),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type alias for executor runs.
pub type ExecuteResult<T> = std::result::Result<T, ExecuteError>;

// Error code implementations for machine-readable error responses
impl Error {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Backend(e) => e.code(),
        }
    }
}

impl BackendError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ENDPOINT_NOT_FOUND",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Status { .. } => "BAD_STATUS",
            Self::Decode(_) => "DECODE_ERROR",
        }
    }

    /// True for the category-level "endpoint absent" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl ExecuteError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Aborted => "ABORTED",
            Self::Failed(e) => e.code(),
        }
    }
}

impl ConfigError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CONFIG_READ_ERROR",
            Self::Parse { .. } => "CONFIG_PARSE_ERROR",
            Self::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
