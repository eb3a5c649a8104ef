//! Reconciliation of push progress with authoritative pulls for one job.
//!
//! Progress events are speculative: they move the progress bar and the ETA
//! but never the status. Status and record counts change only through pulls
//! (`apply_job`, `apply_status_report`), and a pull is applied only if it was
//! issued after the last applied one.

use crate::{
    affordance::{ControlAffordance, ControlInputs, compute_control_affordance},
    progress::ProgressView,
};
use model::{
    events::{CompletionEvent, ProgressEvent},
    job::{ImportJob, StatusReport},
    status::JobStatus,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressMark {
    pub current: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    ForeignJob,
    NotActive(JobStatus),
    Regressed { current: u64, last: u64 },
    Gone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressDecision {
    /// `reached_end` asks the caller to schedule a deferred reload.
    Applied { reached_end: bool },
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullDecision {
    Applied,
    /// A newer pull was already applied.
    Stale { seq: u64, applied: u64 },
    ForeignJob,
}

/// Why a control request was refused before any RPC was made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlRejection {
    #[error("Import cannot be started from status {status} (offered action: {affordance})")]
    NotStartable {
        status: JobStatus,
        affordance: ControlAffordance,
    },

    #[error("A start request is already in flight")]
    StartInFlight,

    #[error("Import cannot be stopped from status {0}")]
    NotStoppable(JobStatus),

    #[error("Nothing to save")]
    NothingToSave,

    #[error("Import no longer exists")]
    Gone,
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    job: ImportJob,
    dirty: bool,
    start_in_flight: bool,
    progress: Option<ProgressView>,
    last_applied: Option<ProgressMark>,
    issued_seq: u64,
    applied_seq: u64,
    stale: bool,
    gone: bool,
}

impl ProgressTracker {
    pub fn new(job: ImportJob) -> Self {
        ProgressTracker {
            job,
            dirty: false,
            start_in_flight: false,
            progress: None,
            last_applied: None,
            issued_seq: 0,
            applied_seq: 0,
            stale: false,
            gone: false,
        }
    }

    pub fn job(&self) -> &ImportJob {
        &self.job
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_gone(&self) -> bool {
        self.gone
    }

    /// The local document was invalidated and a fresh copy is on its way.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn progress(&self) -> Option<&ProgressView> {
        self.progress.as_ref()
    }

    pub fn displayed_message(&self) -> &str {
        self.progress.as_ref().map_or("", |p| p.message.as_str())
    }

    pub fn last_applied(&self) -> Option<ProgressMark> {
        self.last_applied
    }

    pub fn affordance(&self) -> ControlAffordance {
        compute_control_affordance(ControlInputs::from_job(&self.job, self.dirty))
    }

    pub fn control_enabled(&self) -> bool {
        !self.gone && !self.start_in_flight && self.affordance() != ControlAffordance::None
    }

    pub fn apply_progress(&mut self, event: &ProgressEvent) -> ProgressDecision {
        if self.gone {
            return ProgressDecision::Ignored(IgnoreReason::Gone);
        }
        if event.job_id != self.job.id {
            return ProgressDecision::Ignored(IgnoreReason::ForeignJob);
        }
        if !self.job.status.is_active() {
            return ProgressDecision::Ignored(IgnoreReason::NotActive(self.job.status));
        }
        if let Some(last) = self.last_applied
            && event.current < last.current
        {
            return ProgressDecision::Ignored(IgnoreReason::Regressed {
                current: event.current,
                last: last.current,
            });
        }

        self.job.totals.observe_total(event.total);
        self.job.eta_seconds = Some(event.eta_seconds);
        self.last_applied = Some(ProgressMark {
            current: event.current,
            total: event.total,
        });
        self.progress = Some(ProgressView::from_event(self.job.import_mode, event));

        ProgressDecision::Applied {
            reached_end: event.reached_end(),
        }
    }

    pub fn accepts_completion(&self, event: &CompletionEvent) -> bool {
        !self.gone && event.job_id == self.job.id
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Ticket for an authoritative pull about to be issued.
    pub fn begin_fetch(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// Replace the job wholesale with a freshly fetched document.
    pub fn apply_job(&mut self, seq: u64, job: ImportJob) -> PullDecision {
        if job.id != self.job.id {
            return PullDecision::ForeignJob;
        }
        if let Some(stale) = self.check_seq(seq) {
            return stale;
        }

        self.job = job;
        self.dirty = false;
        self.stale = false;
        self.settle_progress();
        PullDecision::Applied
    }

    pub fn apply_status_report(&mut self, seq: u64, report: &StatusReport) -> PullDecision {
        if let Some(stale) = self.check_seq(seq) {
            return stale;
        }

        self.job.status = report.status;
        self.job.totals = report.totals();
        self.settle_progress();
        PullDecision::Applied
    }

    pub fn mark_gone(&mut self) {
        self.gone = true;
        self.progress = None;
        self.last_applied = None;
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn edit_source(&mut self, import_file: Option<String>, google_sheets_url: Option<String>) {
        self.job.import_file = import_file;
        self.job.google_sheets_url = google_sheets_url;
        self.dirty = true;
    }

    /// Check start preconditions and disable the control until the ack.
    pub fn begin_start(&mut self) -> Result<(), ControlRejection> {
        if self.gone {
            return Err(ControlRejection::Gone);
        }
        if self.start_in_flight {
            return Err(ControlRejection::StartInFlight);
        }

        let affordance = self.affordance();
        if self.job.status != JobStatus::Pending || affordance != ControlAffordance::Start {
            return Err(ControlRejection::NotStartable {
                status: self.job.status,
                affordance,
            });
        }

        self.start_in_flight = true;
        Ok(())
    }

    pub fn finish_start(&mut self) {
        self.start_in_flight = false;
    }

    pub fn check_stop(&self) -> Result<(), ControlRejection> {
        if self.gone {
            return Err(ControlRejection::Gone);
        }
        if !self.job.status.is_active() {
            return Err(ControlRejection::NotStoppable(self.job.status));
        }
        Ok(())
    }

    pub fn check_save(&self) -> Result<(), ControlRejection> {
        if self.gone {
            return Err(ControlRejection::Gone);
        }
        if self.affordance() != ControlAffordance::Save {
            return Err(ControlRejection::NothingToSave);
        }
        Ok(())
    }

    fn check_seq(&mut self, seq: u64) -> Option<PullDecision> {
        if seq <= self.applied_seq {
            return Some(PullDecision::Stale {
                seq,
                applied: self.applied_seq,
            });
        }
        self.applied_seq = seq;
        None
    }

    fn settle_progress(&mut self) {
        if !self.job.status.is_active() {
            self.progress = None;
            self.last_applied = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::job::{JobId, Totals};

    fn running_job() -> ImportJob {
        ImportJob::new("imp-1", "Customer")
            .with_import_file("/private/files/customers.csv")
            .with_status(JobStatus::Running)
    }

    #[test]
    fn non_decreasing_progress_is_applied_in_order() {
        let mut tracker = ProgressTracker::new(running_job());
        let mut shown = Vec::new();

        for current in [1, 3, 3, 7, 10] {
            let decision = tracker.apply_progress(&ProgressEvent::new("imp-1", current, 10));
            assert!(matches!(decision, ProgressDecision::Applied { .. }));
            shown.push(tracker.progress().unwrap().current);
        }

        assert!(shown.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            tracker.apply_progress(&ProgressEvent::new("imp-1", 10, 10)),
            ProgressDecision::Applied { reached_end: true }
        );
    }

    #[test]
    fn regressed_progress_is_a_no_op() {
        let mut tracker = ProgressTracker::new(running_job());
        tracker.apply_progress(&ProgressEvent::new("imp-1", 6, 10).with_eta(30));
        let before = tracker.clone();

        let decision = tracker.apply_progress(&ProgressEvent::new("imp-1", 4, 10).with_eta(90));

        assert_eq!(
            decision,
            ProgressDecision::Ignored(IgnoreReason::Regressed { current: 4, last: 6 })
        );
        assert_eq!(tracker.progress(), before.progress());
        assert_eq!(tracker.job(), before.job());
    }

    #[test]
    fn terminal_job_ignores_progress() {
        let job = running_job()
            .with_status(JobStatus::Success)
            .with_totals(Totals::new(10, 0, 10));
        let mut tracker = ProgressTracker::new(job.clone());

        let decision = tracker.apply_progress(&ProgressEvent::new("imp-1", 11, 12));

        assert_eq!(
            decision,
            ProgressDecision::Ignored(IgnoreReason::NotActive(JobStatus::Success))
        );
        assert_eq!(tracker.job(), &job);
    }

    #[test]
    fn progress_never_changes_status() {
        let mut tracker =
            ProgressTracker::new(running_job().with_status(JobStatus::Preprocessing));

        tracker.apply_progress(&ProgressEvent::new("imp-1", 2, 10).skipping());

        assert_eq!(tracker.status(), JobStatus::Preprocessing);
        assert!(tracker.displayed_message().starts_with("Skipping 2 of 10"));
    }

    #[test]
    fn foreign_events_are_discarded() {
        let mut tracker = ProgressTracker::new(running_job());
        assert_eq!(
            tracker.apply_progress(&ProgressEvent::new("imp-2", 1, 10)),
            ProgressDecision::Ignored(IgnoreReason::ForeignJob)
        );
        assert!(!tracker.accepts_completion(&CompletionEvent::new("imp-2")));
        assert!(tracker.accepts_completion(&CompletionEvent::new("imp-1")));
    }

    #[test]
    fn older_pulls_do_not_clobber_newer_ones() {
        let mut tracker = ProgressTracker::new(running_job());
        let first = tracker.begin_fetch();
        let second = tracker.begin_fetch();

        let finished = running_job().with_status(JobStatus::PartialSuccess);
        assert_eq!(tracker.apply_job(second, finished), PullDecision::Applied);

        let report = StatusReport {
            status: JobStatus::Running,
            success: 1,
            failed: 0,
            total_records: 10,
        };
        assert_eq!(
            tracker.apply_status_report(first, &report),
            PullDecision::Stale {
                seq: first,
                applied: second
            }
        );
        assert_eq!(tracker.status(), JobStatus::PartialSuccess);
    }

    #[test]
    fn terminal_pull_clears_speculative_progress() {
        let mut tracker = ProgressTracker::new(running_job());
        tracker.apply_progress(&ProgressEvent::new("imp-1", 10, 10));
        tracker.invalidate();
        assert!(tracker.is_stale());

        let seq = tracker.begin_fetch();
        tracker.apply_job(seq, running_job().with_status(JobStatus::Success));

        assert!(!tracker.is_stale());
        assert!(tracker.progress().is_none());
        assert_eq!(tracker.last_applied(), None);
        assert_eq!(tracker.displayed_message(), "");
    }

    #[test]
    fn pull_for_another_job_is_refused() {
        let mut tracker = ProgressTracker::new(running_job());
        let seq = tracker.begin_fetch();
        let mut other = running_job();
        other.id = JobId::new("imp-2");

        assert_eq!(tracker.apply_job(seq, other), PullDecision::ForeignJob);
    }

    #[test]
    fn start_disables_control_until_finished() {
        let mut tracker =
            ProgressTracker::new(running_job().with_status(JobStatus::Pending));
        assert!(tracker.control_enabled());

        tracker.begin_start().unwrap();
        assert!(!tracker.control_enabled());
        assert_eq!(tracker.status(), JobStatus::Pending);
        assert_eq!(tracker.begin_start(), Err(ControlRejection::StartInFlight));

        tracker.finish_start();
        assert!(tracker.control_enabled());
    }

    #[test]
    fn start_requires_a_saved_source_file() {
        let mut tracker = ProgressTracker::new(ImportJob::new("imp-1", "Customer"));
        assert_eq!(
            tracker.begin_start(),
            Err(ControlRejection::NotStartable {
                status: JobStatus::Pending,
                affordance: ControlAffordance::Save,
            })
        );

        tracker.edit_source(Some("/private/files/c.csv".into()), None);
        assert!(tracker.is_dirty());
        assert!(tracker.begin_start().is_err());
        assert!(tracker.check_save().is_ok());
    }

    #[test]
    fn start_is_refused_outside_pending() {
        for status in [JobStatus::Error, JobStatus::Stopped, JobStatus::Running] {
            let mut tracker = ProgressTracker::new(running_job().with_status(status));
            assert_eq!(
                tracker.begin_start(),
                Err(ControlRejection::NotStartable {
                    status,
                    affordance: ControlAffordance::None,
                })
            );
            assert!(!tracker.control_enabled());
        }
    }

    #[test]
    fn stop_requires_active_status() {
        let tracker = ProgressTracker::new(running_job());
        assert!(tracker.check_stop().is_ok());

        let pending = ProgressTracker::new(running_job().with_status(JobStatus::Pending));
        assert_eq!(
            pending.check_stop(),
            Err(ControlRejection::NotStoppable(JobStatus::Pending))
        );
    }

    #[test]
    fn gone_job_ignores_everything() {
        let mut tracker = ProgressTracker::new(running_job());
        tracker.mark_gone();

        assert_eq!(
            tracker.apply_progress(&ProgressEvent::new("imp-1", 1, 10)),
            ProgressDecision::Ignored(IgnoreReason::Gone)
        );
        assert!(!tracker.accepts_completion(&CompletionEvent::new("imp-1")));
        assert!(!tracker.control_enabled());
    }
}
