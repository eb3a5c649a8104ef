use model::job::JobId;
use thiserror::Error;

/// Failures of the remote job-control and log services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request did not complete: connection refused, 5xx, broken body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The job no longer exists. Never retried.
    #[error("Import {0} not found")]
    NotFound(JobId),

    /// The server refused the request (permissions, validation, scheduler down).
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The response could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request timed out")]
    Timeout,
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}
