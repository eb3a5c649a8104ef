use import_core::{
    actions::FormAction, affordance::ControlAffordance, log_view::LogTable, progress::ProgressView,
};
use model::{
    job::{ErrorReport, ImportJob},
    status::Indicator,
};
use serde::Serialize;

/// Snapshot of everything a job view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorView {
    pub job: ImportJob,
    pub affordance: ControlAffordance,
    pub control_enabled: bool,
    pub indicator: Indicator,
    pub progress: Option<ProgressView>,
    pub headline: Option<String>,
    pub actions: Vec<FormAction>,
    pub logs: Option<LogTable>,
    pub error_report: Option<ErrorReport>,
    pub reload_pending: bool,
    pub gone: bool,
}

impl CoordinatorView {
    pub fn is_terminal(&self) -> bool {
        self.job.status.is_terminal()
    }
}
