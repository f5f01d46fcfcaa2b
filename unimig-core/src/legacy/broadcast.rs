//! Fan-out of write events to watchers.
//!
//! Publishing never waits on a subscriber: each subscriber owns a bounded
//! queue and an event that does not fit is dropped and counted as lag for that
//! subscriber. Closed subscribers are pruned on the next publish.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::unified::{ResourceKey, WriteAction};

pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteEvent {
    pub key: ResourceKey,
    pub action: WriteAction,
    pub folder: String,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<WriteEvent>,
    lagged: u64,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

#[derive(Clone, Default)]
pub struct WriteEventBroadcaster {
    inner: Arc<Mutex<Registry>>,
}

impl WriteEventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.subscribers.push(Subscriber { id, tx, lagged: 0 });
        debug!("write event subscriber {} added", id);

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Offers the event to every subscriber and returns how many accepted it
    pub fn publish(&self, event: &WriteEvent) -> usize {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;

        registry.subscribers.retain_mut(|subscriber| {
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    subscriber.lagged += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("pruning closed write event subscriber {}", subscriber.id);
                    false
                }
            }
        });

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Events dropped for one subscriber because its queue was full
    pub fn lagged(&self, subscription: &Subscription) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .iter()
            .find(|subscriber| subscriber.id == subscription.id)
            .map(|subscriber| subscriber.lagged)
            .unwrap_or(0)
    }
}

/// Receiving end of a subscription; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<WriteEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<WriteEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WriteEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .retain(|subscriber| subscriber.id != self.id);
            debug!("write event subscriber {} removed", self.id);
        }
    }
}
