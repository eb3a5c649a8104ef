use model::{job::ImportJob, status::JobStatus};
use serde::Serialize;

/// Secondary buttons shown next to the primary control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormAction {
    StopImport,
    ExportErroredRows,
    GoToList,
    ExportImportLog,
    ReportError,
}

impl FormAction {
    pub fn label(&self) -> &'static str {
        match self {
            FormAction::StopImport => "Stop Import",
            FormAction::ExportErroredRows => "Export Errored Rows",
            FormAction::GoToList => "Go to List",
            FormAction::ExportImportLog => "Export Import Log",
            FormAction::ReportError => "Report Error",
        }
    }
}

pub fn available_actions(job: &ImportJob, log_count: u64, has_error_report: bool) -> Vec<FormAction> {
    let mut actions = Vec::new();

    if job.status.is_active() {
        actions.push(FormAction::StopImport);
    }
    if job.status == JobStatus::PartialSuccess {
        actions.push(FormAction::ExportErroredRows);
    }
    if job.status.has_successes() {
        actions.push(FormAction::GoToList);
    }
    if !job.is_new && !job.status.is_active() && log_count > 0 {
        actions.push(FormAction::ExportImportLog);
    }
    if job.status == JobStatus::Error && has_error_report {
        actions.push(FormAction::ReportError);
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> ImportJob {
        ImportJob::new("imp-1", "Customer").with_status(status)
    }

    #[test]
    fn running_job_can_only_be_stopped() {
        assert_eq!(
            available_actions(&job(JobStatus::Running), 12, false),
            vec![FormAction::StopImport]
        );
    }

    #[test]
    fn partial_success_offers_exports_and_list() {
        assert_eq!(
            available_actions(&job(JobStatus::PartialSuccess), 3, false),
            vec![
                FormAction::ExportErroredRows,
                FormAction::GoToList,
                FormAction::ExportImportLog,
            ]
        );
    }

    #[test]
    fn report_button_needs_a_report() {
        assert!(!available_actions(&job(JobStatus::Error), 0, false).contains(&FormAction::ReportError));
        assert_eq!(
            available_actions(&job(JobStatus::Error), 0, true),
            vec![FormAction::ReportError]
        );
    }
}
