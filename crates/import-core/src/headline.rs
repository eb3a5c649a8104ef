//! Dashboard headline for a job that has left `Pending`.
//!
//! All inputs are resolved before composition. The headline is built in one
//! synchronous pass so the phase half and the counts half always describe the
//! same moment.

use model::{
    job::{ImportMode, RunningJob, Totals},
    status::JobStatus,
};

pub const SEPARATOR: &str = " | ";
pub const TIMED_OUT_NOTE: &str = "Import timed out, please re-try.";

/// Resolved values the headline is composed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineInputs<'a> {
    pub status: JobStatus,
    pub mode: ImportMode,
    pub totals: Totals,
    /// Best-effort; `None` when the lookup failed or nothing is running.
    pub running: Option<&'a RunningJob>,
}

pub fn phase_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Preprocessing => "Pre-processing data...",
        JobStatus::Running => "Import is running...",
        _ => "",
    }
}

pub fn running_annotation(running: &RunningJob) -> String {
    format!(
        "(Job ID: {}, running {}m {}s)",
        running.job_handle,
        running.elapsed_seconds / 60,
        running.elapsed_seconds % 60
    )
}

pub fn counts_sentence(totals: &Totals, mode: ImportMode) -> String {
    let action = mode.past_tense();
    let records = match totals.success_count {
        1 => "1 record".to_string(),
        n => format!("{n} records"),
    };
    // Clean runs keep the trailing period after the count.
    let period = if totals.failed_count == 0 { "." } else { "" };

    format!(
        "Successfully {action} {records}{period} out of {}.",
        totals.total_records
    )
}

pub fn compose_headline(inputs: &HeadlineInputs<'_>) -> String {
    let label = phase_label(inputs.status);
    let annotation = if inputs.status.is_active() {
        inputs.running.map(running_annotation).unwrap_or_default()
    } else {
        String::new()
    };
    let first = format!("{label} {annotation}").trim().to_string();

    let mut counts = counts_sentence(&inputs.totals, inputs.mode);
    if inputs.status == JobStatus::TimedOut {
        counts.push(' ');
        counts.push_str(TIMED_OUT_NOTE);
    }

    if first.is_empty() {
        counts
    } else {
        format!("{first}{SEPARATOR}{counts}")
    }
}
