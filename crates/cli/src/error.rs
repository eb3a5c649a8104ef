use connectors::error::ConfigError;
use import_core::error::ServiceError;
use import_runtime::error::CoordinatorError;
use model::job::JobId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid site settings: {0}")]
    Site(#[from] ConfigError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("Request failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// The server reported a failure through a notice.
    #[error("{0}")]
    Failed(String),

    #[error("Import {0} no longer exists")]
    Gone(JobId),

    #[error("Log row {0} has no traceback")]
    NoTraceback(usize),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
