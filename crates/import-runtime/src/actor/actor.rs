use crate::error::ActorError;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::mpsc;
use tracing::debug;

/// Identity an actor sees while running.
#[derive(Debug, Clone)]
pub struct ActorContext {
    name: Arc<str>,
}

impl ActorContext {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Mailbox-driven state owner. Messages are handled one at a time between a
/// single `on_start` and a single `on_stop`.
#[async_trait]
pub trait Actor<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    async fn handle(&mut self, msg: M, ctx: &ActorContext) -> Result<(), ActorError>;

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }
}

/// Sending side of an actor's mailbox.
#[derive(Debug)]
pub struct ActorRef<M>
where
    M: Send + Debug + 'static,
{
    ctx: ActorContext,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for ActorRef<M>
where
    M: Send + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M> ActorRef<M>
where
    M: Send + Debug + 'static,
{
    pub fn new(ctx: ActorContext, tx: mpsc::Sender<M>) -> Self {
        Self { ctx, tx }
    }

    /// Waits for mailbox space. Fails once the actor has stopped.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx.send(msg).await.map_err(|rejected| {
            debug!(actor = self.ctx.name(), msg = ?rejected.0, "Mailbox closed, message dropped");
            ActorError::MailboxClosed
        })
    }
}
