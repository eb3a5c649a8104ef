use model::{job::ImportJob, status::JobStatus};
use serde::Serialize;
use std::fmt;

/// The single primary action offered for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAffordance {
    None,
    Save,
    Start,
}

impl ControlAffordance {
    pub fn label(&self) -> &'static str {
        match self {
            ControlAffordance::None => "",
            ControlAffordance::Save => "Save",
            ControlAffordance::Start => "Start Import",
        }
    }
}

impl fmt::Display for ControlAffordance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAffordance::None => f.write_str("none"),
            other => f.write_str(other.label()),
        }
    }
}

/// Inputs of the affordance rule, detached from any job representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInputs {
    pub status: JobStatus,
    pub has_source_file: bool,
    pub is_new: bool,
    pub dirty: bool,
}

impl ControlInputs {
    pub fn from_job(job: &ImportJob, dirty: bool) -> Self {
        ControlInputs {
            status: job.status,
            has_source_file: job.has_source_file(),
            is_new: job.is_new,
            dirty,
        }
    }
}

/// Unsaved edits always win. Every status other than `Pending` offers nothing,
/// failed runs included.
pub fn compute_control_affordance(inputs: ControlInputs) -> ControlAffordance {
    let startable = inputs.has_source_file && !inputs.is_new;

    match inputs.status {
        _ if inputs.dirty => ControlAffordance::Save,
        JobStatus::Pending if startable => ControlAffordance::Start,
        JobStatus::Pending => ControlAffordance::Save,
        _ => ControlAffordance::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(status: JobStatus, has_source_file: bool, is_new: bool, dirty: bool) -> ControlInputs {
        ControlInputs {
            status,
            has_source_file,
            is_new,
            dirty,
        }
    }

    #[test]
    fn unsaved_edits_always_offer_save() {
        for status in JobStatus::ALL {
            assert_eq!(
                compute_control_affordance(inputs(status, true, false, true)),
                ControlAffordance::Save,
                "{status}"
            );
        }
    }

    #[test]
    fn pending_with_file_offers_start() {
        assert_eq!(
            compute_control_affordance(inputs(JobStatus::Pending, true, false, false)),
            ControlAffordance::Start
        );
    }

    #[test]
    fn pending_without_file_or_unsaved_offers_save() {
        assert_eq!(
            compute_control_affordance(inputs(JobStatus::Pending, false, false, false)),
            ControlAffordance::Save
        );
        assert_eq!(
            compute_control_affordance(inputs(JobStatus::Pending, true, true, false)),
            ControlAffordance::Save
        );
    }

    #[test]
    fn failed_run_offers_nothing() {
        assert_eq!(
            compute_control_affordance(inputs(JobStatus::Error, true, false, false)),
            ControlAffordance::None
        );
        assert_eq!(
            compute_control_affordance(inputs(JobStatus::Error, false, false, false)),
            ControlAffordance::None
        );
    }

    #[test]
    fn active_and_finished_jobs_offer_nothing() {
        for status in [
            JobStatus::Preprocessing,
            JobStatus::Running,
            JobStatus::Success,
            JobStatus::PartialSuccess,
            JobStatus::TimedOut,
            JobStatus::Stopped,
        ] {
            assert_eq!(
                compute_control_affordance(inputs(status, true, false, false)),
                ControlAffordance::None,
                "{status}"
            );
        }
    }
}
