use crate::status::JobStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier of an import job (the server document name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        JobId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        JobId::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        JobId(value)
    }
}

/// Whether the import creates records or updates existing ones.
/// Only affects wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImportMode {
    #[default]
    #[serde(rename = "Insert New Records")]
    InsertNew,
    #[serde(rename = "Update Existing Records")]
    UpdateExisting,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::InsertNew => "Insert New Records",
            ImportMode::UpdateExisting => "Update Existing Records",
        }
    }

    /// Past-tense verb used in result sentences.
    pub fn past_tense(&self) -> &'static str {
        match self {
            ImportMode::InsertNew => "imported",
            ImportMode::UpdateExisting => "updated",
        }
    }

    /// Present participle used in progress messages.
    pub fn progressive(&self) -> &'static str {
        match self {
            ImportMode::InsertNew => "Importing",
            ImportMode::UpdateExisting => "Updating",
        }
    }
}

/// Cumulative record counts of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub success_count: u64,
    pub failed_count: u64,
    pub total_records: u64,
}

impl Totals {
    pub fn new(success_count: u64, failed_count: u64, total_records: u64) -> Self {
        Totals {
            success_count,
            failed_count,
            total_records,
        }
    }

    pub fn processed(&self) -> u64 {
        self.success_count + self.failed_count
    }

    /// Raise the known record total. Never lowers it.
    pub fn observe_total(&mut self, total: u64) {
        self.total_records = self.total_records.max(total);
    }
}

/// Local mirror of a server-side import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: JobId,
    pub status: JobStatus,
    pub import_mode: ImportMode,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub eta_seconds: Option<u64>,
    #[serde(default)]
    pub reference_doctype: String,
    #[serde(default)]
    pub import_file: Option<String>,
    #[serde(default)]
    pub google_sheets_url: Option<String>,
    /// Not yet saved on the server.
    #[serde(skip)]
    pub is_new: bool,
}

impl ImportJob {
    pub fn new(id: impl Into<JobId>, reference_doctype: impl Into<String>) -> Self {
        ImportJob {
            id: id.into(),
            status: JobStatus::Pending,
            import_mode: ImportMode::InsertNew,
            totals: Totals::default(),
            eta_seconds: None,
            reference_doctype: reference_doctype.into(),
            import_file: None,
            google_sheets_url: None,
            is_new: false,
        }
    }

    /// An uploaded file or an external sheet reference is attached.
    pub fn has_source_file(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.import_file) || present(&self.google_sheets_url)
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_import_file(mut self, file: impl Into<String>) -> Self {
        self.import_file = Some(file.into());
        self
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.import_mode = mode;
        self
    }

    pub fn with_totals(mut self, totals: Totals) -> Self {
        self.totals = totals;
        self
    }
}

/// Point-in-time answer of the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total_records: u64,
}

impl StatusReport {
    pub fn totals(&self) -> Totals {
        Totals::new(self.success, self.failed, self.total_records)
    }
}

/// The background worker currently running an import, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningJob {
    #[serde(alias = "job_id")]
    pub job_handle: String,
    #[serde(default)]
    pub elapsed_seconds: u64,
}

/// Most recent failure record attached to a job in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub method: String,
    pub error: String,
}

/// Server acknowledgement of a start request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartAck {
    #[serde(default)]
    pub message: String,
}
