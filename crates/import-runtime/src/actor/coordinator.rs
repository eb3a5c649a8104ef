use crate::{
    actor::{
        actor::ActorRef,
        import::ImportActor,
        messages::{CoordinatorMsg, Reply},
        spawn::spawn_actor,
    },
    error::CoordinatorError,
    settings::CoordinatorSettings,
    view::CoordinatorView,
};
use futures::future::join_all;
use import_core::{
    event_bus::{EventBus, Subscription},
    service::Services,
};
use model::{
    events::{CompletionEvent, ProgressEvent},
    job::JobId,
};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Handle to the coordinator of one open import job.
///
/// The job's state lives in an [`ImportActor`]; this handle only sends it
/// messages and exposes the latest [`CoordinatorView`]. Push events reach the
/// actor through bus subscriptions scoped to this job, which are released by
/// [`ImportCoordinator::close`], or on drop when the handle was never closed.
pub struct ImportCoordinator {
    job_id: JobId,
    bus: EventBus,
    actor_ref: ActorRef<CoordinatorMsg>,
    actor_handle: Option<JoinHandle<()>>,
    forwarders: Vec<JoinHandle<()>>,
    subscriptions: Vec<Subscription>,
    view_rx: watch::Receiver<CoordinatorView>,
    cancel_token: CancellationToken,
}

impl ImportCoordinator {
    /// Fetch the job and start coordinating it. Fails if the job does not exist.
    pub async fn open(
        job_id: impl Into<JobId>,
        services: Services,
        bus: EventBus,
        settings: CoordinatorSettings,
    ) -> Result<Self, CoordinatorError> {
        let job_id = job_id.into();
        let job = services.jobs.fetch_job(&job_id).await?;
        info!(job_id = %job_id, status = %job.status, "Opening import coordinator");

        let cancel_token = CancellationToken::new();
        let actor = ImportActor::new(
            job,
            services,
            bus.clone(),
            settings.clone(),
            cancel_token.clone(),
        );
        let view_rx = actor.view_receiver();
        let (actor_ref, actor_handle) = spawn_actor(
            format!("import:{job_id}"),
            settings.mailbox_capacity,
            actor,
            cancel_token.clone(),
        );

        actor_ref
            .send(CoordinatorMsg::SetActorRef(actor_ref.clone()))
            .await?;

        let (progress_tx, progress_rx) = mpsc::channel(settings.event_buffer.max(1));
        let (completion_tx, completion_rx) = mpsc::channel(settings.event_buffer.max(1));
        let subscriptions = vec![
            bus.subscribe::<ProgressEvent>(job_id.clone(), progress_tx)
                .await,
            bus.subscribe::<CompletionEvent>(job_id.clone(), completion_tx)
                .await,
        ];
        let forwarders = vec![
            forward(
                progress_rx,
                actor_ref.clone(),
                CoordinatorMsg::Progress,
                cancel_token.clone(),
            ),
            forward(
                completion_rx,
                actor_ref.clone(),
                CoordinatorMsg::Completed,
                cancel_token.clone(),
            ),
        ];

        Ok(Self {
            job_id,
            bus,
            actor_ref,
            actor_handle: Some(actor_handle),
            forwarders,
            subscriptions,
            view_rx,
            cancel_token,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn actor_ref(&self) -> &ActorRef<CoordinatorMsg> {
        &self.actor_ref
    }

    pub async fn request_start(&self) -> Result<(), CoordinatorError> {
        self.request(CoordinatorMsg::Start).await
    }

    pub async fn request_stop(&self) -> Result<(), CoordinatorError> {
        self.request(CoordinatorMsg::Stop).await
    }

    pub async fn request_save(&self) -> Result<(), CoordinatorError> {
        self.request(CoordinatorMsg::Save).await
    }

    pub async fn reload(&self) -> Result<(), CoordinatorError> {
        self.send(CoordinatorMsg::Reload).await
    }

    pub async fn set_dirty(&self, dirty: bool) -> Result<(), CoordinatorError> {
        self.send(CoordinatorMsg::SetDirty(dirty)).await
    }

    /// Replace the source of a pending import. Marks the job dirty.
    pub async fn attach_source(
        &self,
        import_file: Option<String>,
        google_sheets_url: Option<String>,
    ) -> Result<(), CoordinatorError> {
        self.send(CoordinatorMsg::AttachSource {
            import_file,
            google_sheets_url,
        })
        .await
    }

    pub async fn show_failed_only(&self, failed_only: bool) -> Result<(), CoordinatorError> {
        self.send(CoordinatorMsg::ShowFailedOnly(failed_only)).await
    }

    /// Latest published view.
    pub fn view(&self) -> CoordinatorView {
        self.view_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CoordinatorView> {
        self.view_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Unsubscribe from the bus, cancel timers and stop the actor. Safe to
    /// call more than once.
    pub async fn close(&mut self) {
        if self.is_closed() && self.actor_handle.is_none() {
            return;
        }

        for subscription in self.subscriptions.drain(..) {
            self.bus.unsubscribe(subscription).await;
        }
        self.cancel_token.cancel();

        if let Some(handle) = self.actor_handle.take()
            && let Err(e) = handle.await
        {
            warn!(job_id = %self.job_id, error = %e, "Import actor task failed");
        }
        join_all(self.forwarders.drain(..)).await;

        info!(job_id = %self.job_id, "Closed import coordinator");
    }

    async fn send(&self, msg: CoordinatorMsg) -> Result<(), CoordinatorError> {
        if self.is_closed() {
            return Err(CoordinatorError::Closed);
        }
        self.actor_ref
            .send(msg)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply) -> CoordinatorMsg,
    ) -> Result<(), CoordinatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        reply_rx.await.map_err(|_| CoordinatorError::Closed)?
    }
}

impl Drop for ImportCoordinator {
    fn drop(&mut self) {
        self.cancel_token.cancel();

        if self.subscriptions.is_empty() {
            return;
        }
        // Dropped without `close()`: release the bus subscriptions in the background.
        let subscriptions = std::mem::take(&mut self.subscriptions);
        match Handle::try_current() {
            Ok(handle) => {
                let bus = self.bus.clone();
                handle.spawn(async move {
                    for subscription in subscriptions {
                        bus.unsubscribe(subscription).await;
                    }
                });
            }
            Err(_) => {
                warn!(job_id = %self.job_id, "No runtime to release event subscriptions")
            }
        }
    }
}

fn forward<E>(
    mut rx: mpsc::Receiver<Arc<E>>,
    actor_ref: ActorRef<CoordinatorMsg>,
    wrap: fn(Arc<E>) -> CoordinatorMsg,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    E: Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel_token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if actor_ref.send(wrap(event)).await.is_err() {
                break;
            }
        }
    })
}
