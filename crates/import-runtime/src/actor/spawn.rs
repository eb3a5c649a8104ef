use crate::actor::{Actor, ActorContext, ActorRef};
use std::fmt::Debug;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Spawns a Tokio task that runs the actor event loop until the mailbox closes
/// or `cancel_token` fires. Returns an `ActorRef` and the task's `JoinHandle`.
pub fn spawn_actor<M, A>(
    name: impl Into<String>,
    mailbox_capacity: usize,
    mut actor: A,
    cancel_token: CancellationToken,
) -> (ActorRef<M>, JoinHandle<()>)
where
    A: Actor<M>,
    M: Send + Debug + 'static,
{
    let name: String = name.into();
    let ctx = ActorContext::new(name);
    let (tx, mut rx) = mpsc::channel::<M>(mailbox_capacity.max(1));
    let actor_ref = ActorRef::new(ctx.clone(), tx);

    let handle = tokio::spawn(async move {
        if let Err(e) = actor.on_start(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_start failed");
            return;
        }

        loop {
            let msg = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    debug!(actor = %ctx.name(), "actor cancelled");
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = actor.handle(msg, &ctx).await {
                error!(actor = %ctx.name(), ?e, "actor handle failed");
            }
        }

        rx.close();
        if let Err(e) = actor.on_stop(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_stop failed");
        }
    });

    (actor_ref, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActorError;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    #[derive(Debug)]
    enum CounterMsg {
        Add(u64),
        Get(oneshot::Sender<u64>),
    }

    struct Counter {
        total: u64,
        stopped: Option<oneshot::Sender<u64>>,
    }

    #[async_trait]
    impl Actor<CounterMsg> for Counter {
        async fn handle(&mut self, msg: CounterMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
            match msg {
                CounterMsg::Add(n) => self.total += n,
                CounterMsg::Get(reply) => {
                    let _ = reply.send(self.total);
                }
            }
            Ok(())
        }

        async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
            if let Some(stopped) = self.stopped.take() {
                let _ = stopped.send(self.total);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn processes_messages_in_order_and_stops_on_cancel() {
        let cancel_token = CancellationToken::new();
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let counter = Counter {
            total: 0,
            stopped: Some(stopped_tx),
        };
        let (actor_ref, handle) = spawn_actor("counter", 4, counter, cancel_token.clone());

        actor_ref.send(CounterMsg::Add(2)).await.unwrap();
        actor_ref.send(CounterMsg::Add(3)).await.unwrap();
        let (reply_tx, reply_rx) = oneshot::channel();
        actor_ref.send(CounterMsg::Get(reply_tx)).await.unwrap();
        assert_eq!(reply_rx.await.unwrap(), 5);

        cancel_token.cancel();
        handle.await.unwrap();

        assert_eq!(stopped_rx.await.unwrap(), 5);
        assert!(matches!(
            actor_ref.send(CounterMsg::Add(1)).await,
            Err(ActorError::MailboxClosed)
        ));
    }
}
