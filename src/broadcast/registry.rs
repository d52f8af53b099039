//! Subscriber registry
//!
//! Tracks live subscribers and the wake signal each one waits on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::frame::SubscriberId;

/// Per-subscriber wake signal
///
/// `notify` is raised on every publish; `cancel` fires once, when the
/// subscriber leaves the registry.
#[derive(Debug, Default)]
pub(crate) struct SubscriberSignal {
    pub(crate) notify: Notify,
    pub(crate) cancel: CancellationToken,
}

/// Set of active subscribers
///
/// Membership changes and publish-side fan-out are serialized by one mutex.
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, Arc<SubscriberSignal>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber and return its id and wake signal
    pub(crate) fn register(&self) -> (SubscriberId, Arc<SubscriberSignal>) {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let signal = Arc::new(SubscriberSignal::default());

        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, Arc::clone(&signal));
            subscribers.len()
        };

        tracing::debug!(subscriber = %id, subscribers = count, "Subscriber added");

        (id, signal)
    }

    /// Remove a subscriber and cancel its pending waits
    ///
    /// Returns `false` if the id was not registered. Safe to call more than
    /// once and from any thread.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        match removed {
            Some(signal) => {
                signal.cancel.cancel();
                tracing::debug!(subscriber = %id, subscribers = count, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Remove every subscriber and cancel their waits
    ///
    /// Returns the number removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, signal) in &drained {
            signal.cancel.cancel();
        }
        if !drained.is_empty() {
            tracing::debug!(removed = drained.len(), "All subscribers removed");
        }
        drained.len()
    }

    /// Wake every registered subscriber
    ///
    /// Returns the number of subscribers signalled. A subscriber that is
    /// concurrently leaving either gets a harmless extra permit or is
    /// already gone.
    pub fn notify_all(&self) -> usize {
        let subscribers = self.lock();
        for signal in subscribers.values() {
            signal.notify.notify_one();
        }
        subscribers.len()
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no subscriber is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether the given subscriber is registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, Arc<SubscriberSignal>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
