//! Wire shapes of the Frappe REST API.

use import_core::error::ServiceError;
use model::{
    job::{ImportJob, ImportMode, JobId, Totals},
    status::JobStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `/api/method/...` responses. Frappe omits `message` when the method
/// returned nothing.
#[derive(Debug, Deserialize)]
pub struct MethodEnvelope<T> {
    pub message: Option<T>,
}

/// `/api/resource/...` responses.
#[derive(Debug, Deserialize)]
pub struct ResourceEnvelope<T> {
    pub data: T,
}

/// Error body of a failed request.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub exc_type: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default, rename = "_server_messages")]
    pub server_messages: Option<String>,
}

impl ErrorBody {
    pub fn is_missing_document(&self) -> bool {
        self.exc_type.as_deref() == Some("DoesNotExistError")
    }

    /// Best human-readable reason the server gave.
    pub fn summary(&self) -> Option<String> {
        self.server_message()
            .or_else(|| self.exception.clone())
            .or_else(|| self.exc_type.clone())
    }

    /// `_server_messages` is a JSON list of JSON-encoded message objects.
    fn server_message(&self) -> Option<String> {
        let raw = self.server_messages.as_deref()?;
        let entries: Vec<String> = serde_json::from_str(raw).ok()?;
        entries.iter().find_map(|entry| {
            let parsed: Value = serde_json::from_str(entry).ok()?;
            parsed
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

/// The `Data Import Custom` document as stored on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDocument {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub import_type: Option<String>,
    #[serde(default)]
    pub reference_doctype: String,
    #[serde(default)]
    pub import_file: Option<String>,
    #[serde(default)]
    pub google_sheets_url: Option<String>,
    #[serde(default)]
    pub payload_count: Option<u64>,
}

impl TryFrom<JobDocument> for ImportJob {
    type Error = ServiceError;

    fn try_from(doc: JobDocument) -> Result<Self, Self::Error> {
        let status = match doc.status.as_deref().map(str::trim) {
            None | Some("") => JobStatus::Pending,
            Some(raw) => raw
                .parse::<JobStatus>()
                .map_err(|e| ServiceError::Decode(e.to_string()))?,
        };
        let import_mode = match doc.import_type.as_deref() {
            Some(raw) if raw == ImportMode::UpdateExisting.as_str() => ImportMode::UpdateExisting,
            _ => ImportMode::InsertNew,
        };

        Ok(ImportJob {
            id: JobId::new(doc.name),
            status,
            import_mode,
            totals: Totals::new(0, 0, doc.payload_count.unwrap_or(0)),
            eta_seconds: None,
            reference_doctype: doc.reference_doctype,
            import_file: doc.import_file,
            google_sheets_url: doc.google_sheets_url,
            is_new: false,
        })
    }
}

/// Fields a save is allowed to change.
#[derive(Debug, Serialize)]
pub struct JobUpdate<'a> {
    pub import_type: &'a str,
    pub import_file: Option<&'a str>,
    pub google_sheets_url: Option<&'a str>,
}

impl<'a> From<&'a ImportJob> for JobUpdate<'a> {
    fn from(job: &'a ImportJob) -> Self {
        JobUpdate {
            import_type: job.import_mode.as_str(),
            import_file: job.import_file.as_deref(),
            google_sheets_url: job.google_sheets_url.as_deref(),
        }
    }
}
