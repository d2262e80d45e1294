// Observable state cells
// Replay-latest broadcast: a subscriber receives the current value
// immediately on subscription and every published value afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

/// A broadcast cell holding a current value and an ordered subscriber list.
///
/// `publish` stores the new value, then invokes every subscriber in
/// subscription order on the publishing thread. Subscribers registered
/// through `subscribe` see the current value before any future change.
pub struct StateCell<T> {
    value: RwLock<T>,
    subscribers: Arc<Mutex<Vec<Entry<T>>>>,
    next_id: AtomicU64,
}

impl<T: Clone + 'static> StateCell<T> {
    /// Create a cell with an initial value
    pub fn new(initial: T) -> Self {
        Self {
            value: RwLock::new(initial),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.value.read().unwrap().clone()
    }

    /// Store `value` and notify every subscriber in subscription order
    pub fn publish(&self, value: T) {
        *self.value.write().unwrap() = value.clone();

        // Snapshot outside the lock so a callback may subscribe or publish
        let snapshot: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in snapshot {
            callback(&value);
        }
    }

    /// Register `callback`, invoking it with the current value first.
    ///
    /// The replay and the registration happen atomically with respect to
    /// `publish`: a value published while the subscriber is being added is
    /// delivered to it instead of lost. The initial invocation runs with
    /// the registry locked, so a callback must not subscribe or publish to
    /// its own cell from that first call.
    ///
    /// The returned handle unregisters the callback when dropped or
    /// cancelled; call [`Subscription::detach`] to keep it for the cell's
    /// lifetime.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let callback: Callback<T> = Arc::new(callback);

        let subscribers = Arc::clone(&self.subscribers);
        let mut registry = subscribers.lock().unwrap();

        let current = self.get();
        callback(&current);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        registry.push(Entry { id, callback });
        drop(registry);

        Subscription::new(move || {
            subscribers.lock().unwrap().retain(|entry| entry.id != id);
        })
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

/// Handle to a registered subscriber.
///
/// Dropping the handle (or calling [`cancel`](Self::cancel)) unregisters
/// the callback.
pub struct Subscription {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a subscription from an unregister action
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Unregister the callback now
    pub fn cancel(mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }

    /// Keep the callback registered for the lifetime of its cell
    pub fn detach(mut self) {
        self.unregister.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}
