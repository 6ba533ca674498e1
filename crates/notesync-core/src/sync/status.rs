//! Observable sync status.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::watch;

/// Snapshot of the engine's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub pending_changes: usize,
}

type Listener = Arc<dyn Fn(SyncStatus) + Send + Sync>;

struct Inner {
    sender: watch::Sender<SyncStatus>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl Inner {
    fn listeners(&self) -> MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publishes [`SyncStatus`] to callbacks and to `watch` receivers.
///
/// Clones share the same listeners and the same latest value.
#[derive(Clone)]
pub struct StatusNotifier {
    inner: Arc<Inner>,
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusNotifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StatusNotifier")
            .field("current", &self.current())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl StatusNotifier {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SyncStatus::default());
        Self {
            inner: Arc::new(Inner {
                sender,
                listeners: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a callback invoked on every published status.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SyncStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().insert(id, Arc::new(callback));
        Subscription {
            id,
            notifier: Arc::downgrade(&self.inner),
        }
    }

    /// Receiver that always holds the latest status.
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.inner.sender.subscribe()
    }

    pub fn current(&self) -> SyncStatus {
        *self.inner.sender.borrow()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    pub fn publish(&self, status: SyncStatus) {
        self.inner.sender.send_replace(status);

        // Callbacks run outside the lock so they may subscribe or unsubscribe
        let listeners: Vec<Listener> = self.inner.listeners().values().cloned().collect();
        for listener in listeners {
            listener(status);
        }
    }
}

/// Handle for a registered status callback; dropping it unregisters exactly
/// that callback.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    notifier: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner.listeners().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recorder() -> (Arc<Mutex<Vec<SyncStatus>>>, impl Fn(SyncStatus) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |status| sink.lock().unwrap().push(status))
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let notifier = StatusNotifier::new();
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();
        let _first = notifier.subscribe(first);
        let _second = notifier.subscribe(second);

        let status = SyncStatus {
            is_syncing: true,
            pending_changes: 3,
        };
        notifier.publish(status);

        assert_eq!(*first_seen.lock().unwrap(), vec![status]);
        assert_eq!(*second_seen.lock().unwrap(), vec![status]);
        assert_eq!(notifier.current(), status);
    }

    #[test]
    fn dropping_subscription_removes_only_its_callback() {
        let notifier = StatusNotifier::new();
        let (kept_seen, kept) = recorder();
        let (dropped_seen, dropped) = recorder();
        let _kept = notifier.subscribe(kept);
        let dropped = notifier.subscribe(dropped);
        assert_eq!(notifier.listener_count(), 2);

        dropped.unsubscribe();
        assert_eq!(notifier.listener_count(), 1);

        notifier.publish(SyncStatus::default());
        assert_eq!(kept_seen.lock().unwrap().len(), 1);
        assert!(dropped_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn identical_callbacks_unsubscribe_independently() {
        let notifier = StatusNotifier::new();
        let (seen, callback) = recorder();
        let callback = Arc::new(callback);

        let first = {
            let callback = Arc::clone(&callback);
            notifier.subscribe(move |status| callback(status))
        };
        let _second = {
            let callback = Arc::clone(&callback);
            notifier.subscribe(move |status| callback(status))
        };

        drop(first);
        notifier.publish(SyncStatus::default());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn subscription_outliving_notifier_is_harmless() {
        let notifier = StatusNotifier::new();
        let subscription = notifier.subscribe(|_| {});
        drop(notifier);
        drop(subscription);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watch_receiver_observes_latest_status() {
        let notifier = StatusNotifier::new();
        let mut receiver = notifier.watch();

        notifier.publish(SyncStatus {
            is_syncing: false,
            pending_changes: 7,
        });

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().pending_changes, 7);
    }
}
