use crate::{actor::ActorRef, error::CoordinatorError};
use import_core::error::ServiceError;
use model::{
    events::{CompletionEvent, ProgressEvent},
    job::{ErrorReport, ImportJob, RunningJob, StartAck, StatusReport},
    log::LogRecord,
};
use std::sync::Arc;
use tokio::sync::oneshot;

pub type Reply = oneshot::Sender<Result<(), CoordinatorError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    AfterStart,
    AfterStop,
    ReachedEnd,
}

/// Messages for the import actor.
///
/// Each message is applied as one transaction on the coordinator state.
#[derive(Debug)]
pub enum CoordinatorMsg {
    /// Initialize the actor with its own reference so spawned RPCs can report back.
    SetActorRef(ActorRef<CoordinatorMsg>),

    // Push events, already filtered to this job by the bus.
    Progress(Arc<ProgressEvent>),
    Completed(Arc<CompletionEvent>),

    // User requests.
    Start(Reply),
    Stop(Reply),
    Save(Reply),
    Reload,
    SetDirty(bool),
    AttachSource {
        import_file: Option<String>,
        google_sheets_url: Option<String>,
    },
    ShowFailedOnly(bool),

    /// A deferred reload timer fired.
    DeferredReload { generation: u64 },

    // Results of spawned RPCs.
    StartFinished(Result<StartAck, ServiceError>),
    StopFinished(Result<(), ServiceError>),
    SaveFinished(Result<ImportJob, ServiceError>),
    JobFetched {
        seq: u64,
        result: Result<ImportJob, ServiceError>,
    },
    HeadlineResolved {
        seq: u64,
        status: Result<StatusReport, ServiceError>,
        running: Option<RunningJob>,
    },
    LogsLoaded(Result<(Vec<LogRecord>, u64), ServiceError>),
    ErrorReportLoaded(Result<Option<ErrorReport>, ServiceError>),
}
