use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Lifecycle status of an import job as stored on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Preprocessing,
    Running,
    Success,
    #[serde(rename = "Partial Success")]
    PartialSuccess,
    Error,
    #[serde(rename = "Timed Out")]
    TimedOut,
    Stopped,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Pending,
        JobStatus::Preprocessing,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::PartialSuccess,
        JobStatus::Error,
        JobStatus::TimedOut,
        JobStatus::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Preprocessing => "Preprocessing",
            JobStatus::Running => "Running",
            JobStatus::Success => "Success",
            JobStatus::PartialSuccess => "Partial Success",
            JobStatus::Error => "Error",
            JobStatus::TimedOut => "Timed Out",
            JobStatus::Stopped => "Stopped",
        }
    }

    /// The server is working on the job and progress events may arrive.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Preprocessing | JobStatus::Running)
    }

    /// No further progress is accepted until the job is reloaded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success
                | JobStatus::PartialSuccess
                | JobStatus::Error
                | JobStatus::TimedOut
                | JobStatus::Stopped
        )
    }

    /// At least some records made it in.
    pub fn has_successes(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::PartialSuccess)
    }

    pub fn indicator(&self) -> Indicator {
        match self {
            JobStatus::Preprocessing => Indicator::Neutral,
            JobStatus::Running => Indicator::Info,
            JobStatus::PartialSuccess => Indicator::Warning,
            JobStatus::Success => Indicator::Positive,
            JobStatus::Error | JobStatus::Stopped => Indicator::Negative,
            JobStatus::Pending | JobStatus::TimedOut => Indicator::Neutral,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Status color shown by list and summary views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Neutral,
    Info,
    Warning,
    Positive,
    Negative,
}

impl Indicator {
    /// Color name understood by the desk list view.
    pub fn color(&self) -> &'static str {
        match self {
            Indicator::Neutral => "grey",
            Indicator::Info => "blue",
            Indicator::Warning => "yellow",
            Indicator::Positive => "green",
            Indicator::Negative => "red",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.color())
    }
}
