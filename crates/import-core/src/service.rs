use crate::error::ServiceError;
use async_trait::async_trait;
use model::{
    job::{ErrorReport, ImportJob, JobId, RunningJob, StartAck, StatusReport},
    log::LogRecord,
};
use std::sync::Arc;

/// Start, stop and point-in-time queries for import jobs.
#[async_trait]
pub trait JobControlService: Send + Sync {
    async fn start(&self, job_id: &JobId) -> Result<StartAck, ServiceError>;

    /// Cooperative: the server-side job observes the stop signal later.
    async fn stop(&self, job_id: &JobId) -> Result<(), ServiceError>;

    /// Full reload of the job document.
    async fn fetch_job(&self, job_id: &JobId) -> Result<ImportJob, ServiceError>;

    /// Persist local edits (source file, sheet URL, mode) and return the saved document.
    async fn save(&self, job: &ImportJob) -> Result<ImportJob, ServiceError>;

    async fn status(&self, job_id: &JobId) -> Result<StatusReport, ServiceError>;

    /// The worker currently running an import, if any.
    async fn running_job(&self) -> Result<Option<RunningJob>, ServiceError>;

    /// Most recent failure record for a job that ended in `Error`.
    async fn latest_error(&self, job_id: &JobId) -> Result<Option<ErrorReport>, ServiceError>;
}

/// Per-row outcome records and file exports.
#[async_trait]
pub trait LogService: Send + Sync {
    async fn logs(&self, job_id: &JobId) -> Result<Vec<LogRecord>, ServiceError>;

    async fn log_count(&self, job_id: &JobId) -> Result<u64, ServiceError>;

    /// Spreadsheet of the rows that failed, ready to fix and re-import.
    async fn errored_rows(&self, job_id: &JobId) -> Result<Vec<u8>, ServiceError>;

    async fn full_log(&self, job_id: &JobId) -> Result<Vec<u8>, ServiceError>;
}

/// The collaborators a coordinator talks to.
#[derive(Clone)]
pub struct Services {
    pub jobs: Arc<dyn JobControlService>,
    pub logs: Arc<dyn LogService>,
}

impl Services {
    pub fn new(jobs: Arc<dyn JobControlService>, logs: Arc<dyn LogService>) -> Self {
        Services { jobs, logs }
    }

    /// Both services backed by one implementation.
    pub fn from_shared<S>(service: Arc<S>) -> Self
    where
        S: JobControlService + LogService + 'static,
    {
        Services {
            jobs: service.clone(),
            logs: service,
        }
    }
}
