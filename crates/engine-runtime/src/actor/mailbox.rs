use crate::error::ActorError;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sending half of an actor's mailbox. Cloned freely; the actor keeps one
/// for scheduling its own follow-up messages.
#[derive(Debug)]
pub struct Mailbox<M> {
    name: Arc<str>,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M> Mailbox<M>
where
    M: Send + Debug + 'static,
{
    pub fn channel(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                name: Arc::from(name.into()),
                tx,
            },
            rx,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ActorError::MailboxClosed(self.name.to_string()))
    }

    /// Delivers `msg` after `delay` from a detached task. A mailbox that
    /// closed in the meantime only gets a debug line.
    pub fn send_after(&self, msg: M, delay: Duration) {
        let mailbox = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = mailbox.send(msg).await {
                debug!(actor = mailbox.name(), error = %e, "Dropped scheduled message");
            }
        });
    }

    pub fn try_send(&self, msg: M) -> Result<(), ActorError> {
        self.tx.try_send(msg).map_err(|e| {
            warn!(actor = %self.name, error = %e, "Mailbox rejected message");
            ActorError::MailboxClosed(self.name.to_string())
        })
    }
}
