use import_core::{error::ServiceError, event_bus::EventBus, service::JobControlService};
use model::{
    events::{CompletionEvent, ProgressEvent},
    job::JobId,
    status::JobStatus,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(JobStatus),
    NotFound,
    Cancelled,
}

/// Turns periodic `status` pulls into progress and completion events.
pub struct StatusPoller {
    job_id: JobId,
    jobs: Arc<dyn JobControlService>,
    bus: EventBus,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(
        job_id: JobId,
        jobs: Arc<dyn JobControlService>,
        bus: EventBus,
        interval: Duration,
    ) -> Self {
        Self {
            job_id,
            jobs,
            bus,
            interval,
        }
    }

    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<PollOutcome> {
        tokio::spawn(self.run(cancel_token))
    }

    pub async fn run(self, cancel_token: CancellationToken) -> PollOutcome {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut rate = RateEstimator::default();
        let mut previous: Option<JobStatus> = None;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => return PollOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            let report = match self.jobs.status(&self.job_id).await {
                Ok(report) => report,
                Err(ServiceError::NotFound(_)) => {
                    warn!(job_id = %self.job_id, "Import disappeared, stopping poller");
                    return PollOutcome::NotFound;
                }
                Err(e) => {
                    warn!(job_id = %self.job_id, error = %e, "Status poll failed");
                    continue;
                }
            };

            let status = report.status;
            if status.is_terminal() {
                info!(job_id = %self.job_id, %status, "Import finished");
                self.refresh().await;
                return PollOutcome::Completed(status);
            }

            if status.is_active() {
                // Subscribers still holding a pre-start snapshot drop progress
                // until they reload.
                if !previous.is_some_and(|p| p.is_active()) {
                    info!(job_id = %self.job_id, %status, "Import started");
                    self.refresh().await;
                }

                let current = report.success + report.failed;
                if report.total_records > 0 {
                    let eta = rate.observe(current, report.total_records, Instant::now());
                    let event = ProgressEvent::new(self.job_id.clone(), current, report.total_records)
                        .with_eta(eta);
                    self.bus.publish(event).await;
                }
            } else {
                debug!(job_id = %self.job_id, %status, "Waiting for import to start");
            }

            previous = Some(status);
        }
    }

    async fn refresh(&self) {
        self.bus
            .publish(CompletionEvent::new(self.job_id.clone()))
            .await;
    }
}

/// Advisory ETA from the throughput observed since the first active poll.
#[derive(Debug, Default)]
struct RateEstimator {
    origin: Option<(Instant, u64)>,
}

impl RateEstimator {
    fn observe(&mut self, current: u64, total: u64, now: Instant) -> u64 {
        let (start, start_count) = *self.origin.get_or_insert((now, current));
        let elapsed = now.duration_since(start).as_secs_f64();
        let done = current.saturating_sub(start_count);

        if done == 0 || elapsed <= 0.0 {
            return 0;
        }

        let remaining = total.saturating_sub(current) as f64;
        (remaining * elapsed / done as f64).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eta_follows_observed_rate() {
        let mut rate = RateEstimator::default();
        let start = Instant::now();

        assert_eq!(rate.observe(10, 100, start), 0);
        // 20 records in 10s leaves 70 records, about 35s.
        assert_eq!(rate.observe(30, 100, start + Duration::from_secs(10)), 35);
    }

    #[tokio::test]
    async fn stalled_import_has_no_eta() {
        let mut rate = RateEstimator::default();
        let start = Instant::now();
        rate.observe(5, 50, start);
        assert_eq!(rate.observe(5, 50, start + Duration::from_secs(30)), 0);
    }
}
