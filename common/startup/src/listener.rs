//! Lifecycle event delivery from the host to the tracker.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, info};

use crate::tracker::StartupTracker;

/// Events the host delivers. A host may send each one any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The host began loading its bundle.
    BundleLoadStarted,
}

/// What a bundle load after the first one does to the timing baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Keep the first baseline and cached metrics; only count the load.
    #[default]
    PreserveBaseline,
    /// Re-arm the baseline and drop cached metrics on every load.
    Rebaseline,
}

impl FromStr for ReloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "preserve" => Ok(ReloadPolicy::PreserveBaseline),
            "rebaseline" => Ok(ReloadPolicy::Rebaseline),
            _ => Err(format!("Unknown reload policy: {s}, must be PRESERVE or REBASELINE")),
        }
    }
}

type Callback = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: RwLock<BTreeMap<u64, Callback>>,
}

/// Fan-out of host lifecycle events to subscribers.
///
/// [`emit`](LifecycleBus::emit) runs every callback synchronously on the
/// calling thread, in subscription order, so once it returns all subscribers
/// have observed the event.
#[derive(Clone, Default)]
pub struct LifecycleBus {
    inner: Arc<BusInner>,
}

impl LifecycleBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`; it stays subscribed until the returned
    /// [`Subscription`] is cancelled or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Delivers `event` to every live subscriber and returns how many saw it.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        // Snapshot first: callbacks may subscribe or cancel while running.
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        debug!(?event, subscribers = callbacks.len(), "Lifecycle event emitted");
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// RAII subscription handle. Dropping it unsubscribes, so keep it alive for
/// as long as events should be observed. Cancelling twice is a no-op.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
    cancelled: AtomicBool,
}

impl Subscription {
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Subscribes `tracker` to bundle load events on `bus`, applying `policy`
/// to every load after the first.
pub fn install(
    tracker: Arc<StartupTracker>,
    bus: &LifecycleBus,
    policy: ReloadPolicy,
) -> Subscription {
    info!(tracker = %tracker.name(), ?policy, "Startup: listening for bundle loads");
    bus.subscribe(move |event| match event {
        LifecycleEvent::BundleLoadStarted => tracker.observe_bundle_load(policy),
    })
}
