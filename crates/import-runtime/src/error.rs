use import_core::{error::ServiceError, tracker::ControlRejection};
use model::job::JobId;
use thiserror::Error;

/// Common error type for all actors in the runtime.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Actor internal error: {0}")]
    Internal(String),
}

/// Errors surfaced to callers of the coordinator handle.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The request was refused before any RPC was issued.
    #[error(transparent)]
    Rejected(#[from] ControlRejection),

    #[error("Import {0} not found")]
    JobNotFound(JobId),

    #[error("Service error: {0}")]
    Service(ServiceError),

    #[error("Coordinator is closed")]
    Closed,

    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),
}

impl From<ServiceError> for CoordinatorError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(id) => CoordinatorError::JobNotFound(id),
            other => CoordinatorError::Service(other),
        }
    }
}
