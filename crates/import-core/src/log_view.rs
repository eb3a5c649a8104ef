use model::{
    job::ImportMode,
    log::{LogMessage, LogRecord},
};
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    Success,
    Failure,
}

/// One rendered log row. Tracebacks are not part of the row text; they are
/// revealed on request through [`LogTable::reveal_traceback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    pub row_numbers: String,
    pub status: RowStatus,
    pub message: String,
    pub reference_link: Option<String>,
    pub has_traceback: bool,
    #[serde(skip)]
    traceback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogTable {
    rows: Vec<LogRow>,
    page_size: usize,
}

impl LogTable {
    pub fn build(
        records: &[LogRecord],
        mode: ImportMode,
        reference_doctype: &str,
        failed_only: bool,
    ) -> Self {
        let rows = records
            .iter()
            .filter(|record| !(failed_only && record.succeeded))
            .map(|record| render_row(record, mode, reference_doctype))
            .collect();

        LogTable {
            rows,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size)
    }

    /// Zero-based page; out of range pages are empty.
    pub fn page(&self, index: usize) -> &[LogRow] {
        let start = index.saturating_mul(self.page_size);
        if start >= self.rows.len() {
            return &[];
        }
        let end = (start + self.page_size).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn reveal_traceback(&self, row: usize) -> Option<&str> {
        self.rows.get(row)?.traceback.as_deref()
    }
}

/// Desk URL of a document: `/app/{doctype-slug}/{name}`.
pub fn form_link(doctype: &str, name: &str) -> String {
    let slug = doctype.trim().to_lowercase().replace(' ', "-");
    format!("/app/{slug}/{name}")
}

fn render_row(record: &LogRecord, mode: ImportMode, reference_doctype: &str) -> LogRow {
    let row_numbers = record.row_indexes.to_string();

    if record.succeeded {
        let name = record.document_name.as_deref().unwrap_or_default();
        return LogRow {
            row_numbers,
            status: RowStatus::Success,
            message: format!("Successfully {} {name}", mode.past_tense()),
            reference_link: (!name.is_empty()).then(|| form_link(reference_doctype, name)),
            has_traceback: false,
            traceback: None,
        };
    }

    let traceback = record
        .exception_trace
        .clone()
        .filter(|trace| !trace.is_empty());

    LogRow {
        row_numbers,
        status: RowStatus::Failure,
        message: join_messages(&record.messages),
        reference_link: None,
        has_traceback: traceback.is_some(),
        traceback,
    }
}

fn join_messages(messages: &[LogMessage]) -> String {
    messages
        .iter()
        .map(|m| match m.title.as_deref() {
            Some(title) if m.message.is_empty() => title.to_string(),
            Some(title) => format!("{title}: {}", m.message),
            None => m.message.clone(),
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
