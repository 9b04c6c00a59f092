use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::trace;

type SubscriberFn = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Handle returned by [`Broadcaster::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct SubscriberTable {
    next_id: u64,
    entries: HashMap<u64, SubscriberFn>,
}

/// One-to-many fan-out of extension broadcasts.
///
/// Cloneable handle over a shared subscriber set. Delivery is synchronous:
/// `broadcast` invokes every current subscriber while holding the set lock,
/// so the membership is stable for the duration of one fan-out. Subscribers
/// must not call back into the broadcaster from their callback.
#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<SubscriberTable>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber invoked with the raw bytes of every broadcast.
    pub fn subscribe(&self, subscriber: impl Fn(&[u8]) + Send + Sync + 'static) -> SubscriberId {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = table.next_id;
        table.next_id += 1;
        table.entries.insert(id, Box::new(subscriber));
        SubscriberId(id)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        table.entries.remove(&id.0);
    }

    /// Deliver `data` to every current subscriber, synchronously.
    pub fn broadcast(&self, data: &[u8]) {
        let table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        trace!(subscribers = table.entries.len(), len = data.len(), "broadcast");
        for subscriber in table.entries.values() {
            subscriber(data);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        table.entries.len()
    }
}
