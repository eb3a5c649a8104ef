use crate::{
    actor::{
        actor::{Actor, ActorContext, ActorRef},
        messages::{CoordinatorMsg, ReloadReason, Reply},
        scheduler::ReloadScheduler,
    },
    error::ActorError,
    settings::CoordinatorSettings,
    view::CoordinatorView,
};
use async_trait::async_trait;
use import_core::{
    actions::available_actions,
    error::ServiceError,
    event_bus::EventBus,
    headline::{HeadlineInputs, compose_headline},
    log_view::LogTable,
    service::Services,
    tracker::{ProgressDecision, ProgressTracker, PullDecision},
};
use model::{
    events::{CompletionEvent, Notice, ProgressEvent},
    job::{ErrorReport, ImportJob, JobId, RunningJob, StartAck, StatusReport},
    log::LogRecord,
    status::JobStatus,
};
use std::{future::Future, time::Duration};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const START_NOTICE: &str = "Start Processing Import";
pub const STOP_NOTICE: &str = "Stopping import...";

/// Everything the view is rendered from.
struct JobState {
    tracker: ProgressTracker,
    headline: Option<String>,
    log_records: Vec<LogRecord>,
    log_count: u64,
    logs: Option<LogTable>,
    failed_only: bool,
    page_size: usize,
    error_report: Option<ErrorReport>,
}

impl JobState {
    fn new(job: ImportJob, page_size: usize) -> Self {
        Self {
            tracker: ProgressTracker::new(job),
            headline: None,
            log_records: Vec::new(),
            log_count: 0,
            logs: None,
            failed_only: false,
            page_size,
            error_report: None,
        }
    }

    fn refresh_headline(&mut self, running: Option<&RunningJob>) {
        let job = self.tracker.job();
        self.headline = (job.status != JobStatus::Pending).then(|| {
            compose_headline(&HeadlineInputs {
                status: job.status,
                mode: job.import_mode,
                totals: job.totals,
                running,
            })
        });
    }

    fn rebuild_logs(&mut self) {
        let job = self.tracker.job();
        let table = LogTable::build(
            &self.log_records,
            job.import_mode,
            &job.reference_doctype,
            self.failed_only,
        );
        self.logs = Some(table.with_page_size(self.page_size));
    }

    fn snapshot(&self, reload_pending: bool) -> CoordinatorView {
        let job = self.tracker.job();
        let gone = self.tracker.is_gone();

        CoordinatorView {
            job: job.clone(),
            affordance: self.tracker.affordance(),
            control_enabled: self.tracker.control_enabled(),
            indicator: job.status.indicator(),
            progress: self.tracker.progress().cloned(),
            headline: self.headline.clone(),
            actions: if gone {
                Vec::new()
            } else {
                available_actions(job, self.log_count, self.error_report.is_some())
            },
            logs: self.logs.clone(),
            error_report: self.error_report.clone(),
            reload_pending,
            gone,
        }
    }
}

/// Owns the state of one open import job. All reconciliation between push
/// events, user requests and RPC results happens here, one message at a time.
pub struct ImportActor {
    services: Services,
    bus: EventBus,
    settings: CoordinatorSettings,
    cancel_token: CancellationToken,
    state: JobState,
    actor_ref: Option<ActorRef<CoordinatorMsg>>,
    reloads: Option<ReloadScheduler>,
    view_tx: watch::Sender<CoordinatorView>,
}

impl ImportActor {
    pub fn new(
        job: ImportJob,
        services: Services,
        bus: EventBus,
        settings: CoordinatorSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        let state = JobState::new(job, settings.log_page_size);
        let view_tx = watch::Sender::new(state.snapshot(false));

        Self {
            services,
            bus,
            settings,
            cancel_token,
            state,
            actor_ref: None,
            reloads: None,
            view_tx,
        }
    }

    pub fn view_receiver(&self) -> watch::Receiver<CoordinatorView> {
        self.view_tx.subscribe()
    }

    fn job_id(&self) -> JobId {
        self.state.tracker.job().id.clone()
    }

    fn me(&self) -> Result<ActorRef<CoordinatorMsg>, ActorError> {
        self.actor_ref
            .clone()
            .ok_or_else(|| ActorError::Internal("actor reference not set".to_string()))
    }

    /// Run an RPC off the actor and deliver its result as a message.
    fn dispatch<F>(&self, rpc: F) -> Result<(), ActorError>
    where
        F: Future<Output = CoordinatorMsg> + Send + 'static,
    {
        let me = self.me()?;
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                msg = rpc => {
                    let _ = me.send(msg).await;
                }
            }
        });
        Ok(())
    }

    fn schedule_reload(&mut self, delay: Duration, reason: ReloadReason) -> Result<(), ActorError> {
        let reloads = self
            .reloads
            .as_mut()
            .ok_or_else(|| ActorError::Internal("reload scheduler not set".to_string()))?;
        reloads.schedule(delay, reason);
        Ok(())
    }

    fn cancel_reload(&mut self) {
        if let Some(reloads) = self.reloads.as_mut() {
            reloads.cancel();
        }
    }

    fn publish_view(&self) {
        let reload_pending = self.reloads.as_ref().is_some_and(ReloadScheduler::is_pending);
        self.view_tx.send_replace(self.state.snapshot(reload_pending));
    }

    async fn notify(&self, notice: Notice) {
        self.bus.publish(notice).await;
    }

    async fn service_failure(&self, context: &str, err: ServiceError) {
        let job_id = self.job_id();
        warn!(job_id = %job_id, error = %err, "{context}");
        self.notify(Notice::failure(job_id, format!("{context}: {err}")))
            .await;
    }

    async fn mark_gone(&mut self) {
        let job_id = self.job_id();
        warn!(job_id = %job_id, "Import no longer exists");

        self.state.tracker.mark_gone();
        self.cancel_reload();
        self.notify(Notice::failure(
            job_id.clone(),
            format!("Import {job_id} no longer exists"),
        ))
        .await;
    }

    fn fetch_job(&mut self) -> Result<(), ActorError> {
        let seq = self.state.tracker.begin_fetch();
        let jobs = self.services.jobs.clone();
        let job_id = self.job_id();
        debug!(job_id = %job_id, seq, "Fetching import");

        self.dispatch(async move {
            let result = jobs.fetch_job(&job_id).await;
            CoordinatorMsg::JobFetched { seq, result }
        })
    }

    /// Follow-up lookups for a freshly applied job document.
    fn after_authoritative_job(&mut self) -> Result<(), ActorError> {
        let job = self.state.tracker.job();
        let status = job.status;
        let saved = !job.is_new;

        if status == JobStatus::Pending {
            self.state.headline = None;
        } else {
            self.resolve_headline(status.is_active())?;
        }

        if saved && !status.is_active() {
            self.load_logs()?;
        }

        if status == JobStatus::Error {
            self.load_error_report()?;
        } else {
            self.state.error_report = None;
        }

        Ok(())
    }

    fn resolve_headline(&mut self, active: bool) -> Result<(), ActorError> {
        let seq = self.state.tracker.begin_fetch();
        let jobs = self.services.jobs.clone();
        let job_id = self.job_id();

        self.dispatch(async move {
            let running = async {
                if !active {
                    return None;
                }
                match jobs.running_job().await {
                    Ok(running) => running,
                    Err(e) => {
                        debug!(job_id = %job_id, error = %e, "Running job lookup failed");
                        None
                    }
                }
            };
            let (status, running) = tokio::join!(jobs.status(&job_id), running);
            CoordinatorMsg::HeadlineResolved {
                seq,
                status,
                running,
            }
        })
    }

    fn load_logs(&self) -> Result<(), ActorError> {
        let logs = self.services.logs.clone();
        let job_id = self.job_id();

        self.dispatch(async move {
            let (records, count) = tokio::join!(logs.logs(&job_id), logs.log_count(&job_id));
            CoordinatorMsg::LogsLoaded(records.and_then(|records| count.map(|count| (records, count))))
        })
    }

    fn load_error_report(&self) -> Result<(), ActorError> {
        let jobs = self.services.jobs.clone();
        let job_id = self.job_id();

        self.dispatch(async move { CoordinatorMsg::ErrorReportLoaded(jobs.latest_error(&job_id).await) })
    }

    fn on_progress(&mut self, event: &ProgressEvent) -> Result<(), ActorError> {
        match self.state.tracker.apply_progress(event) {
            ProgressDecision::Applied { reached_end: true } => {
                debug!(job_id = %event.job_id, total = event.total, "Progress reached the last record");
                self.schedule_reload(self.settings.completion_refresh_delay, ReloadReason::ReachedEnd)
            }
            ProgressDecision::Applied { .. } => Ok(()),
            ProgressDecision::Ignored(reason) => {
                debug!(
                    job_id = %event.job_id,
                    current = event.current,
                    ?reason,
                    "Ignoring progress event"
                );
                Ok(())
            }
        }
    }

    fn on_completed(&mut self, event: &CompletionEvent) -> Result<(), ActorError> {
        if !self.state.tracker.accepts_completion(event) {
            debug!(job_id = %event.job_id, "Ignoring completion event");
            return Ok(());
        }

        info!(job_id = %event.job_id, "Refresh requested, reloading");
        self.state.tracker.invalidate();
        self.cancel_reload();
        self.fetch_job()
    }

    async fn on_job_fetched(
        &mut self,
        seq: u64,
        result: Result<ImportJob, ServiceError>,
    ) -> Result<(), ActorError> {
        match result {
            Ok(job) => match self.state.tracker.apply_job(seq, job) {
                PullDecision::Applied => {
                    debug!(job_id = %self.job_id(), seq, status = %self.state.tracker.status(), "Applied import");
                    self.after_authoritative_job()?;
                }
                decision => debug!(job_id = %self.job_id(), seq, ?decision, "Dropping import fetch"),
            },
            Err(ServiceError::NotFound(_)) => self.mark_gone().await,
            Err(e) => self.service_failure("Failed to reload import", e).await,
        }
        Ok(())
    }

    async fn on_headline_resolved(
        &mut self,
        seq: u64,
        status: Result<StatusReport, ServiceError>,
        running: Option<RunningJob>,
    ) -> Result<(), ActorError> {
        let report = match status {
            Ok(report) => report,
            Err(ServiceError::NotFound(_)) => {
                self.mark_gone().await;
                return Ok(());
            }
            Err(e) => {
                self.service_failure("Failed to fetch import status", e).await;
                return Ok(());
            }
        };

        let previous = self.state.tracker.status();
        match self.state.tracker.apply_status_report(seq, &report) {
            PullDecision::Applied => {
                self.state.refresh_headline(running.as_ref());
                if previous.is_active() && !report.status.is_active() {
                    self.load_logs()?;
                }
                if previous != JobStatus::Error && report.status == JobStatus::Error {
                    self.load_error_report()?;
                }
            }
            decision => debug!(job_id = %self.job_id(), seq, ?decision, "Dropping status report"),
        }
        Ok(())
    }

    async fn handle_start(&mut self, reply: Reply) -> Result<(), ActorError> {
        let job_id = self.job_id();
        if let Err(rejection) = self.state.tracker.begin_start() {
            debug!(job_id = %job_id, %rejection, "Start refused");
            let _ = reply.send(Err(rejection.into()));
            return Ok(());
        }

        info!(job_id = %job_id, "Starting import");
        let jobs = self.services.jobs.clone();
        let rpc_job_id = job_id.clone();
        self.dispatch(async move { CoordinatorMsg::StartFinished(jobs.start(&rpc_job_id).await) })?;
        self.schedule_reload(self.settings.start_reload_delay, ReloadReason::AfterStart)?;

        let _ = reply.send(Ok(()));
        Ok(())
    }

    async fn on_start_finished(&mut self, result: Result<StartAck, ServiceError>) {
        self.state.tracker.finish_start();
        let job_id = self.job_id();

        match result {
            Ok(ack) => {
                info!(job_id = %job_id, ack = %ack.message, "Import start acknowledged");
                self.notify(Notice::info(job_id, START_NOTICE)).await;
            }
            Err(e) => self.service_failure("Failed to start import", e).await,
        }
    }

    async fn handle_stop(&mut self, reply: Reply) -> Result<(), ActorError> {
        let job_id = self.job_id();
        if let Err(rejection) = self.state.tracker.check_stop() {
            debug!(job_id = %job_id, %rejection, "Stop refused");
            let _ = reply.send(Err(rejection.into()));
            return Ok(());
        }

        info!(job_id = %job_id, "Stopping import");
        let jobs = self.services.jobs.clone();
        let rpc_job_id = job_id.clone();
        self.dispatch(async move { CoordinatorMsg::StopFinished(jobs.stop(&rpc_job_id).await) })?;

        let _ = reply.send(Ok(()));
        Ok(())
    }

    async fn on_stop_finished(&mut self, result: Result<(), ServiceError>) -> Result<(), ActorError> {
        if !self.state.tracker.is_gone() {
            self.schedule_reload(self.settings.stop_reload_delay, ReloadReason::AfterStop)?;
        }

        match result {
            Ok(()) => self.notify(Notice::info(self.job_id(), STOP_NOTICE)).await,
            Err(e) => self.service_failure("Failed to stop import", e).await,
        }
        Ok(())
    }

    async fn handle_save(&mut self, reply: Reply) -> Result<(), ActorError> {
        if let Err(rejection) = self.state.tracker.check_save() {
            let _ = reply.send(Err(rejection.into()));
            return Ok(());
        }

        let jobs = self.services.jobs.clone();
        let job = self.state.tracker.job().clone();
        self.dispatch(async move { CoordinatorMsg::SaveFinished(jobs.save(&job).await) })?;

        let _ = reply.send(Ok(()));
        Ok(())
    }

    async fn on_save_finished(
        &mut self,
        result: Result<ImportJob, ServiceError>,
    ) -> Result<(), ActorError> {
        match result {
            Ok(job) => {
                let seq = self.state.tracker.begin_fetch();
                if self.state.tracker.apply_job(seq, job) == PullDecision::Applied {
                    info!(job_id = %self.job_id(), "Import saved");
                    self.notify(Notice::info(self.job_id(), "Saved")).await;
                    self.after_authoritative_job()?;
                }
            }
            Err(e) => self.service_failure("Failed to save import", e).await,
        }
        Ok(())
    }
}

#[async_trait]
impl Actor<CoordinatorMsg> for ImportActor {
    async fn on_start(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(actor = ctx.name(), job_id = %self.job_id(), "Import actor started");
        Ok(())
    }

    async fn handle(&mut self, msg: CoordinatorMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        let result = match msg {
            CoordinatorMsg::SetActorRef(actor_ref) => {
                self.reloads = Some(ReloadScheduler::new(
                    actor_ref.clone(),
                    self.cancel_token.clone(),
                ));
                self.actor_ref = Some(actor_ref);
                self.after_authoritative_job()
            }
            CoordinatorMsg::Progress(event) => self.on_progress(&event),
            CoordinatorMsg::Completed(event) => self.on_completed(&event),
            CoordinatorMsg::Start(reply) => self.handle_start(reply).await,
            CoordinatorMsg::Stop(reply) => self.handle_stop(reply).await,
            CoordinatorMsg::Save(reply) => self.handle_save(reply).await,
            CoordinatorMsg::Reload => {
                if self.state.tracker.is_gone() {
                    Ok(())
                } else {
                    self.fetch_job()
                }
            }
            CoordinatorMsg::SetDirty(dirty) => {
                self.state.tracker.set_dirty(dirty);
                Ok(())
            }
            CoordinatorMsg::AttachSource {
                import_file,
                google_sheets_url,
            } => {
                self.state.tracker.edit_source(import_file, google_sheets_url);
                Ok(())
            }
            CoordinatorMsg::ShowFailedOnly(failed_only) => {
                self.state.failed_only = failed_only;
                if self.state.logs.is_some() {
                    self.state.rebuild_logs();
                }
                Ok(())
            }
            CoordinatorMsg::DeferredReload { generation } => {
                let fired = self.reloads.as_mut().and_then(|r| r.fire(generation));
                match fired {
                    Some(reason) => {
                        debug!(job_id = %self.job_id(), ?reason, "Deferred reload fired");
                        self.fetch_job()
                    }
                    None => Ok(()),
                }
            }
            CoordinatorMsg::StartFinished(result) => {
                self.on_start_finished(result).await;
                Ok(())
            }
            CoordinatorMsg::StopFinished(result) => self.on_stop_finished(result).await,
            CoordinatorMsg::SaveFinished(result) => self.on_save_finished(result).await,
            CoordinatorMsg::JobFetched { seq, result } => self.on_job_fetched(seq, result).await,
            CoordinatorMsg::HeadlineResolved {
                seq,
                status,
                running,
            } => self.on_headline_resolved(seq, status, running).await,
            CoordinatorMsg::LogsLoaded(result) => {
                match result {
                    Ok((records, count)) => {
                        self.state.log_records = records;
                        self.state.log_count = count;
                        self.state.rebuild_logs();
                    }
                    Err(e) => self.service_failure("Failed to load import logs", e).await,
                }
                Ok(())
            }
            CoordinatorMsg::ErrorReportLoaded(result) => {
                match result {
                    Ok(report) => self.state.error_report = report,
                    Err(e) => warn!(job_id = %self.job_id(), error = %e, "Error report lookup failed"),
                }
                Ok(())
            }
        };

        self.publish_view();
        result
    }

    async fn on_stop(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(actor = ctx.name(), job_id = %self.job_id(), "Import actor stopping");
        self.cancel_reload();
        Ok(())
    }
}
