use crate::actor::{
    actor::ActorRef,
    messages::{CoordinatorMsg, ReloadReason},
};
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct PendingReload {
    generation: u64,
    reason: ReloadReason,
    token: CancellationToken,
}

/// Single-slot deferred reload timer.
///
/// Scheduling cancels the previous timer. A timer message that was already in
/// the mailbox when it got superseded is recognized by its stale generation.
#[derive(Debug)]
pub struct ReloadScheduler {
    actor_ref: ActorRef<CoordinatorMsg>,
    parent: CancellationToken,
    generation: u64,
    pending: Option<PendingReload>,
}

impl ReloadScheduler {
    pub fn new(actor_ref: ActorRef<CoordinatorMsg>, parent: CancellationToken) -> Self {
        Self {
            actor_ref,
            parent,
            generation: 0,
            pending: None,
        }
    }

    pub fn schedule(&mut self, delay: Duration, reason: ReloadReason) -> u64 {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let token = self.parent.child_token();
        let timer_token = token.clone();
        let actor_ref = self.actor_ref.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = timer_token.cancelled() => {}
                _ = time::sleep(delay) => {
                    // The actor may be gone already; nothing left to reload then.
                    let _ = actor_ref.send(CoordinatorMsg::DeferredReload { generation }).await;
                }
            }
        });

        debug!(generation, ?reason, ?delay, "Scheduled deferred reload");
        self.pending = Some(PendingReload {
            generation,
            reason,
            token,
        });
        generation
    }

    /// Cancel the pending timer, if any. Returns its reason.
    pub fn cancel(&mut self) -> Option<ReloadReason> {
        let pending = self.pending.take()?;
        pending.token.cancel();
        debug!(
            generation = pending.generation,
            reason = ?pending.reason,
            "Superseded deferred reload"
        );
        Some(pending.reason)
    }

    /// Claim a fired timer. `None` when it was superseded in the meantime.
    pub fn fire(&mut self, generation: u64) -> Option<ReloadReason> {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending.take().map(|pending| pending.reason)
            }
            _ => {
                debug!(generation, "Dropping stale reload timer");
                None
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
