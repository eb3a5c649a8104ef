use crate::{env::EnvManager, error::CliError};
use connectors::frappe::{FrappeClient, FrappeConfig};
use import_core::{
    event_bus::{EventBus, Subscription},
    service::Services,
};
use import_runtime::{actor::ImportCoordinator, settings::CoordinatorSettings};
use model::{events::Notice, job::JobId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const NOTICE_BUFFER: usize = 16;

/// Everything a command needs to talk to one site.
pub struct Session {
    pub client: Arc<FrappeClient>,
    pub bus: EventBus,
    pub settings: CoordinatorSettings,
}

impl Session {
    pub fn from_env(env: &EnvManager) -> Result<Self, CliError> {
        let config = FrappeConfig::from_vars(env.all())?;
        debug!(?config, "Connecting to Frappe site");

        Ok(Session {
            client: Arc::new(FrappeClient::new(config)?),
            bus: EventBus::new(),
            settings: CoordinatorSettings::from_vars(env.all()),
        })
    }

    pub fn services(&self) -> Services {
        Services::from_shared(self.client.clone())
    }

    pub async fn open(&self, job_id: &JobId) -> Result<ImportCoordinator, CliError> {
        let coordinator = ImportCoordinator::open(
            job_id.clone(),
            self.services(),
            self.bus.clone(),
            self.settings.clone(),
        )
        .await?;
        Ok(coordinator)
    }

    /// Notices published for `job_id` from now on.
    pub async fn notices(&self, job_id: &JobId) -> NoticeStream {
        let (tx, rx) = mpsc::channel(NOTICE_BUFFER);
        let subscription = self.bus.subscribe::<Notice>(job_id.clone(), tx).await;
        NoticeStream {
            bus: self.bus.clone(),
            subscription: Some(subscription),
            rx,
        }
    }
}

pub struct NoticeStream {
    bus: EventBus,
    subscription: Option<Subscription>,
    rx: mpsc::Receiver<Arc<Notice>>,
}

impl NoticeStream {
    pub async fn recv(&mut self) -> Option<Arc<Notice>> {
        self.rx.recv().await
    }

    pub async fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.bus.unsubscribe(subscription).await;
        }
    }
}
