use model::{
    events::{Event, ImportEvent, JobScoped},
    job::JobId,
};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

type Senders = HashMap<u64, Box<dyn Any + Send + Sync>>;

/// A subscription handle that can be used to unsubscribe from events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    event_type_id: TypeId,
    job_id: JobId,
    subscriber_id: u64,
}

impl Subscription {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

/// In-process event channel. Subscribers register for one event type of one
/// job, so a view only ever sees its own job's traffic.
#[derive(Clone, Default)]
pub struct EventBus {
    // Event TypeId -> job -> subscriber id -> mpsc::Sender<Arc<E>>
    subscribers: Arc<RwLock<HashMap<TypeId, HashMap<JobId, Senders>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub async fn subscribe<E>(&self, job_id: JobId, sender: mpsc::Sender<Arc<E>>) -> Subscription
    where
        E: Event + JobScoped + Clone,
    {
        let event_type_id = TypeId::of::<E>();
        let subscriber_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(event_type_id)
            .or_default()
            .entry(job_id.clone())
            .or_default()
            .insert(subscriber_id, Box::new(sender));

        debug!(
            event_type = std::any::type_name::<E>(),
            job_id = %job_id,
            subscriber_id,
            "Subscribed to job events"
        );

        Subscription {
            event_type_id,
            job_id,
            subscriber_id,
        }
    }

    /// Deliver to every subscriber of this event's job. Never blocks: a full
    /// subscriber loses the event.
    pub async fn publish<E>(&self, event: E)
    where
        E: Event + JobScoped + Clone,
    {
        let subscribers = self.subscribers.read().await;
        let Some(job_subscribers) = subscribers
            .get(&TypeId::of::<E>())
            .and_then(|by_job| by_job.get(event.job_id()))
        else {
            debug!(
                event_type = event.event_type(),
                job_id = %event.job_id(),
                "No subscribers for event"
            );
            return;
        };

        let event = Arc::new(event);
        for (subscriber_id, boxed_sender) in job_subscribers {
            let Some(sender) = boxed_sender.downcast_ref::<mpsc::Sender<Arc<E>>>() else {
                warn!(
                    event_type = event.event_type(),
                    subscriber_id, "Failed to downcast sender for subscriber"
                );
                continue;
            };

            if let Err(e) = sender.try_send(event.clone()) {
                warn!(
                    event_type = event.event_type(),
                    job_id = %event.job_id(),
                    subscriber_id,
                    error = %e,
                    "Dropped event for subscriber"
                );
            }
        }
    }

    /// Route a decoded push message to the matching typed subscribers.
    pub async fn publish_import_event(&self, event: ImportEvent) {
        match event {
            ImportEvent::Progress(progress) => self.publish(progress).await,
            ImportEvent::Completed(completed) => self.publish(completed).await,
        }
    }

    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.write().await;

        let Some(by_job) = subscribers.get_mut(&subscription.event_type_id) else {
            return;
        };

        if let Some(job_subscribers) = by_job.get_mut(&subscription.job_id) {
            job_subscribers.remove(&subscription.subscriber_id);
            debug!(
                job_id = %subscription.job_id,
                subscriber_id = subscription.subscriber_id,
                "Unsubscribed from job events"
            );

            if job_subscribers.is_empty() {
                by_job.remove(&subscription.job_id);
            }
        }

        if by_job.is_empty() {
            subscribers.remove(&subscription.event_type_id);
        }
    }

    pub async fn subscriber_count<E>(&self, job_id: &JobId) -> usize
    where
        E: Event,
    {
        let subscribers = self.subscribers.read().await;

        subscribers
            .get(&TypeId::of::<E>())
            .and_then(|by_job| by_job.get(job_id))
            .map_or(0, HashMap::len)
    }

    /// Number of jobs with at least one live subscription of any type.
    pub async fn active_jobs(&self) -> usize {
        let subscribers = self.subscribers.read().await;
        let mut jobs: Vec<&JobId> = subscribers.values().flat_map(HashMap::keys).collect();
        jobs.sort();
        jobs.dedup();
        jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::events::{CompletionEvent, ProgressEvent};

    #[tokio::test]
    async fn delivers_only_to_subscribers_of_the_same_job() {
        let bus = EventBus::new();
        let (tx_a, mut rx_a) = mpsc::channel::<Arc<ProgressEvent>>(4);
        let (tx_b, mut rx_b) = mpsc::channel::<Arc<ProgressEvent>>(4);

        bus.subscribe(JobId::new("a"), tx_a).await;
        bus.subscribe(JobId::new("b"), tx_b).await;

        bus.publish(ProgressEvent::new("a", 1, 10)).await;

        assert_eq!(rx_a.recv().await.unwrap().current, 1);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn routes_by_event_type() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel::<Arc<CompletionEvent>>(4);
        bus.subscribe(JobId::new("a"), tx).await;

        bus.publish(ProgressEvent::new("a", 1, 10)).await;
        bus.publish_import_event(ImportEvent::Completed(CompletionEvent::new("a")))
            .await;

        assert_eq!(rx.recv().await.unwrap().job_id, JobId::new("a"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_prunes_empty_entries() {
        let bus = EventBus::new();
        let job = JobId::new("a");
        let (tx, _rx) = mpsc::channel::<Arc<ProgressEvent>>(1);

        let sub = bus.subscribe(job.clone(), tx).await;
        assert_eq!(bus.subscriber_count::<ProgressEvent>(&job).await, 1);
        assert_eq!(bus.active_jobs().await, 1);

        bus.unsubscribe(sub).await;
        assert_eq!(bus.subscriber_count::<ProgressEvent>(&job).await, 0);
        assert_eq!(bus.active_jobs().await, 0);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn full_subscriber_drops_event() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel::<Arc<ProgressEvent>>(1);
        bus.subscribe(JobId::new("a"), tx).await;

        bus.publish(ProgressEvent::new("a", 1, 10)).await;
        bus.publish(ProgressEvent::new("a", 2, 10)).await;

        assert_eq!(rx.recv().await.unwrap().current, 1);
        assert!(rx.try_recv().is_err());
        assert!(logs_contain("Dropped event for subscriber"));
    }
}
