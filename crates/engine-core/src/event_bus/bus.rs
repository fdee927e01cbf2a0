use model::events::Event;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

/// A subscription handle that can be used to unsubscribe from events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    subscriber_id: u64,
}

struct Subscribers<E> {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<Arc<E>>>,
}

/// Fan-out of one event type to any number of bounded channels.
///
/// Publishing never waits: a full channel drops the event for that
/// subscriber, a closed one is removed.
pub struct EventBus<E: Event> {
    inner: Arc<RwLock<Subscribers<E>>>,
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        EventBus {
            inner: Arc::new(RwLock::new(Subscribers {
                next_id: 0,
                senders: HashMap::new(),
            })),
        }
    }

    pub async fn subscribe(&self, capacity: usize) -> (Subscription, mpsc::Receiver<Arc<E>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut inner = self.inner.write().await;
        let subscriber_id = inner.next_id;
        inner.next_id += 1;
        inner.senders.insert(subscriber_id, tx);

        debug!(
            event_type = std::any::type_name::<E>(),
            subscriber_id, "Subscribed to events"
        );
        (Subscription { subscriber_id }, rx)
    }

    pub async fn publish(&self, event: E) {
        let event = Arc::new(event);
        let mut closed = Vec::new();
        {
            let inner = self.inner.read().await;
            if inner.senders.is_empty() {
                debug!(event_type = event.event_type(), "No subscribers for event");
                return;
            }

            for (subscriber_id, sender) in inner.senders.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => warn!(
                        event_type = event.event_type(),
                        subscriber_id, "Dropped event for slow subscriber (channel full)"
                    ),
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*subscriber_id),
                }
            }
        }

        if !closed.is_empty() {
            let mut inner = self.inner.write().await;
            for id in closed {
                inner.senders.remove(&id);
            }
        }
    }

    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut inner = self.inner.write().await;
        inner.senders.remove(&subscription.subscriber_id);
        debug!(
            subscriber_id = subscription.subscriber_id,
            "Unsubscribed from events"
        );
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::events::pipeline::PipelineEvent;

    fn event(error: &str) -> PipelineEvent {
        PipelineEvent::CriticalError {
            category: None,
            context: "test".into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = EventBus::<PipelineEvent>::new();
        let (_, mut a) = bus.subscribe(4).await;
        let (_, mut b) = bus.subscribe(4).await;

        bus.publish(event("boom")).await;

        assert_eq!(a.recv().await.unwrap().event_type(), "critical.error");
        assert_eq!(b.recv().await.unwrap().event_type(), "critical.error");
    }

    #[tokio::test]
    async fn drops_when_full_and_prunes_closed() {
        let bus = EventBus::<PipelineEvent>::new();
        let (_, mut slow) = bus.subscribe(1).await;
        let (_, gone) = bus.subscribe(1).await;
        drop(gone);

        bus.publish(event("first")).await;
        bus.publish(event("second")).await;

        assert_eq!(bus.subscriber_count().await, 1);
        let got = slow.recv().await.unwrap();
        assert!(matches!(&*got, PipelineEvent::CriticalError { error, .. } if error == "first"));
        assert!(slow.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::<PipelineEvent>::new();
        let (sub, mut rx) = bus.subscribe(4).await;
        bus.unsubscribe(sub).await;
        bus.publish(event("x")).await;
        assert!(rx.recv().await.is_none());
    }
}
