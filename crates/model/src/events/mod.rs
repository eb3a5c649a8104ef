use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod realtime;

/// A trait for events that can be published on the EventBus.
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns a unique identifier for this event type.
    fn event_type(&self) -> &'static str;
}

/// Events that belong to exactly one import job. The bus routes on this.
pub trait JobScoped {
    fn job_id(&self) -> &JobId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    #[default]
    Success,
    Skipping,
}

/// Partial completion counts pushed while a job runs.
///
/// Delivery order across events is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub current: u64,
    pub total: u64,
    pub eta_seconds: u64,
    pub phase: ProgressPhase,
}

impl ProgressEvent {
    pub fn new(job_id: impl Into<JobId>, current: u64, total: u64) -> Self {
        ProgressEvent {
            job_id: job_id.into(),
            current,
            total,
            eta_seconds: 0,
            phase: ProgressPhase::Success,
        }
    }

    pub fn with_eta(mut self, eta_seconds: u64) -> Self {
        self.eta_seconds = eta_seconds;
        self
    }

    pub fn skipping(mut self) -> Self {
        self.phase = ProgressPhase::Skipping;
        self
    }

    pub fn reached_end(&self) -> bool {
        self.current == self.total
    }
}

impl Event for ProgressEvent {
    fn event_type(&self) -> &'static str {
        "import.progress"
    }
}

impl JobScoped for ProgressEvent {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

/// The job left the active state. Carries no status; the receiver refetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub job_id: JobId,
}

impl CompletionEvent {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        CompletionEvent {
            job_id: job_id.into(),
        }
    }
}

impl Event for CompletionEvent {
    fn event_type(&self) -> &'static str {
        "import.completed"
    }
}

impl JobScoped for CompletionEvent {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Failure,
}

/// Transient message for the user, e.g. "Stopping import..." or a failed RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub job_id: JobId,
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn info(job_id: JobId, message: impl Into<String>) -> Self {
        Notice {
            job_id,
            level: NoticeLevel::Info,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(job_id: JobId, message: impl Into<String>) -> Self {
        Notice {
            job_id,
            level: NoticeLevel::Failure,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl Event for Notice {
    fn event_type(&self) -> &'static str {
        match self.level {
            NoticeLevel::Info => "notice.info",
            NoticeLevel::Failure => "notice.failure",
        }
    }
}

impl JobScoped for Notice {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

/// Anything the push channel can deliver for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    Progress(ProgressEvent),
    Completed(CompletionEvent),
}

impl ImportEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            ImportEvent::Progress(evt) => &evt.job_id,
            ImportEvent::Completed(evt) => &evt.job_id,
        }
    }
}
