//! Error taxonomy for the curation engine
//!
//! Failures are isolated at the smallest meaningful unit (one post, one
//! delegation account, one donation). These variants only describe what
//! went wrong; the caller decides how far an error travels.

/// Result alias used across the engine
pub type Result<T, E = CuratorError> = std::result::Result<T, E>;

/// Errors emitted by the curation engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum CuratorError {
    /// RPC or network failure reported by a ledger
    #[error("platform request failed: {0}")]
    Platform(String),
    /// Unknown account or post
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed memo, amount or content
    #[error("validation failed: {0}")]
    Validation(String),
    /// Record or boost store failure
    #[error("persistence failed: {0}")]
    Persistence(String),
    /// Credential could not be decoded or derived
    #[error("credential rejected: {0}")]
    Credential(String),
    /// Terminal failure after the retry budget was spent
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<CuratorError>,
    },
}

impl CuratorError {
    /// Whether a fresh attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CuratorError::Platform(_))
    }

    /// Whether the error is an input rejection that should stay out of error logs
    pub fn is_validation(&self) -> bool {
        matches!(self, CuratorError::Validation(_))
    }
}

impl From<rusqlite::Error> for CuratorError {
    fn from(err: rusqlite::Error) -> Self {
        CuratorError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for CuratorError {
    fn from(err: std::io::Error) -> Self {
        CuratorError::Persistence(err.to_string())
    }
}
