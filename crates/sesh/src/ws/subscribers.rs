//! Subscriber registry for connection signals.
//!
//! Dispatch is synchronous and in registration order. The set must tolerate
//! mutation from inside a dispatch callback, including removal of the
//! currently-executing subscriber, so dispatch runs over a snapshot taken
//! under the lock and callbacks run with the lock released.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::types::ConnectionSignal;

/// Callback invoked for every connection signal.
pub type SignalHandler = Arc<dyn Fn(&ConnectionSignal) + Send + Sync>;

/// Opaque id returned by subscribe; unsubscribe is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The connection's subscriber list.
pub struct SubscriberSet {
    entries: Mutex<Vec<(u64, SignalHandler)>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber; it will receive signals after all earlier
    /// registrations.
    pub fn subscribe(&self, handler: SignalHandler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .expect("subscriber set poisoned")
            .push((id, handler));
        SubscriptionId(id)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.entries
            .lock()
            .expect("subscriber set poisoned")
            .retain(|(entry_id, _)| *entry_id != id.0);
    }

    /// Deliver a signal to every current subscriber, in registration order.
    /// A panicking subscriber is isolated and does not block the rest.
    pub fn dispatch(&self, signal: &ConnectionSignal) {
        let snapshot: Vec<(u64, SignalHandler)> = self
            .entries
            .lock()
            .expect("subscriber set poisoned")
            .clone();
        for (id, handler) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(signal))).is_err() {
                warn!(subscriber = id, "subscriber panicked during dispatch");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("subscriber set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriberSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn signal() -> ConnectionSignal {
        ConnectionSignal::Connected
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let set = SubscriberSet::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            set.subscribe(Arc::new(move |_| order.lock().unwrap().push(tag)));
        }

        set.dispatch(&signal());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let set = SubscriberSet::new();
        let id = set.subscribe(Arc::new(|_| {}));
        set.unsubscribe(id);
        set.unsubscribe(id);
        assert!(set.is_empty());
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_the_rest() {
        let set = SubscriberSet::new();
        let delivered = Arc::new(StdMutex::new(0));

        set.subscribe(Arc::new(|_| panic!("boom")));
        let counter = Arc::clone(&delivered);
        set.subscribe(Arc::new(move |_| *counter.lock().unwrap() += 1));

        set.dispatch(&signal());
        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[test]
    fn test_self_removal_during_dispatch() {
        let set = Arc::new(SubscriberSet::new());
        let slot: Arc<StdMutex<Option<SubscriptionId>>> = Arc::new(StdMutex::new(None));
        let fired = Arc::new(StdMutex::new(0));

        let set_ref = Arc::clone(&set);
        let slot_ref = Arc::clone(&slot);
        let fired_ref = Arc::clone(&fired);
        let id = set.subscribe(Arc::new(move |_| {
            *fired_ref.lock().unwrap() += 1;
            if let Some(own_id) = *slot_ref.lock().unwrap() {
                set_ref.unsubscribe(own_id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        set.dispatch(&signal());
        set.dispatch(&signal());
        // Fired once, removed itself, absent from the second dispatch.
        assert_eq!(*fired.lock().unwrap(), 1);
        assert!(set.is_empty());
    }
}
