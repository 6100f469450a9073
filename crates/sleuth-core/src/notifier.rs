//! Change notification for synchronized case graphs.
//!
//! Subscribers register a callback and receive every [`ChangeEvent`] in
//! registration order. A subscriber that returns an error or panics is logged
//! and skipped; the remaining subscribers still get the event.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::patch::PatchOperation;
use crate::store::GraphStore;

/// What happened to the case graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A case was (re)loaded from its text source.
    Load,
    /// The canonical text was replaced wholesale.
    Update,
    /// The held text was re-parsed.
    Refresh,
    /// A patch was applied.
    Mutation(PatchOperation),
}

impl SyncEvent {
    /// Event name as seen by presentation code: `load`, `update`, `refresh`,
    /// `add`, `update` or `delete`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Update => "update",
            Self::Refresh => "refresh",
            Self::Mutation(op) => op.as_str(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event together with the store it produced.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: SyncEvent,
    pub store: GraphStore,
}

type Callback = Arc<dyn Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving events. Returns false if the subscription was already
    /// gone (or the notifier itself was dropped).
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.subscribers.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("Registry").field("subscribers", &count).finish()
    }
}

/// Outcome of one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Publish/subscribe fan-out of [`ChangeEvent`]s.
///
/// Cloning yields another handle on the same subscriber list, so a notifier
/// can be shared between successive sessions.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Registry>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Subscribers are called in registration order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        debug!(subscription = id, "Subscriber registered");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a subscriber that forwards events into an async channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                debug!("Change channel receiver dropped");
            }
            Ok(())
        });
        (subscription, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Deliver `event` to every live subscriber.
    pub fn notify(&self, event: &ChangeEvent) -> DeliveryReport {
        // Snapshot the list so callbacks may (un)subscribe without deadlocking.
        let subscribers: Vec<(u64, Callback)> = self
            .registry
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut report = DeliveryReport::default();
        for (id, callback) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(subscription = id, event = %event.kind, error = %e, "Subscriber failed");
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(subscription = id, event = %event.kind, "Subscriber panicked");
                    report.failed += 1;
                }
            }
        }

        debug!(
            event = %event.kind,
            case_id = %event.store.case_id(),
            delivered = report.delivered,
            failed = report.failed,
            "Change event delivered"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: SyncEvent) -> ChangeEvent {
        ChangeEvent {
            kind,
            store: GraphStore::empty("case-1"),
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(SyncEvent::Load.name(), "load");
        assert_eq!(SyncEvent::Refresh.name(), "refresh");
        assert_eq!(SyncEvent::Mutation(PatchOperation::Add).name(), "add");
        assert_eq!(SyncEvent::Mutation(PatchOperation::Delete).to_string(), "delete");
    }

    #[test]
    fn test_registration_order() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = seen.clone();
            notifier.subscribe(move |_| {
                seen.lock().unwrap().push(n);
                Ok(())
            });
        }

        let report = notifier.notify(&event(SyncEvent::Load));
        assert_eq!(report.delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_subscribers_are_isolated() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicU64::new(0));

        notifier.subscribe(|_| anyhow::bail!("render failed"));
        notifier.subscribe(|_| panic!("subscriber bug"));
        let counter = hits.clone();
        notifier.subscribe(move |e| {
            assert_eq!(e.kind, SyncEvent::Update);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = notifier.notify(&event(SyncEvent::Update));
        assert_eq!(report, DeliveryReport { delivered: 1, failed: 2 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let sub = notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        notifier.notify(&event(SyncEvent::Load));
        assert!(sub.unsubscribe());
        notifier.notify(&event(SyncEvent::Load));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let notifier = ChangeNotifier::new();
        let other = notifier.clone();
        let _sub = other.subscribe(|_| Ok(()));
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_subscription() {
        let notifier = ChangeNotifier::new();
        let (_sub, mut rx) = notifier.subscribe_channel();

        notifier.notify(&event(SyncEvent::Mutation(PatchOperation::Update)));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind.name(), "update");
        assert_eq!(received.store.case_id(), "case-1");
    }
}
