//! Error types for batch matching.
//!

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchMatchError {
    /// A resumed run's stored query descriptor differs from the live one.
    #[error(
        "Configuration mismatch: cannot resume batch match with inconsistent query (stored: {stored}, current: {current})"
    )]
    ConfigurationMismatch { stored: String, current: String },
    /// The matching collaborator failed for a specific item.
    #[error("Match failed for item {item_id}: {reason}")]
    MatchFailure { item_id: String, reason: String },
    /// Submission attempted after the pool was aborted or stopped.
    #[error("Work queue closed: {reason}")]
    QueueClosed { reason: String },
    /// Programming error, e.g. running a controller twice.
    #[error("Misuse: {0}")]
    Misuse(String),
    #[error("Journal error for {path}: {reason}")]
    Journal { path: String, reason: String },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid query descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchMatchError {
    pub(crate) fn journal(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        BatchMatchError::Journal {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is the fail-fast rejection of a closed queue.
    pub fn is_queue_closed(&self) -> bool {
        matches!(self, BatchMatchError::QueueClosed { .. })
    }
}

impl From<config::ConfigError> for BatchMatchError {
    fn from(error: config::ConfigError) -> Self {
        BatchMatchError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BatchMatchError>;
