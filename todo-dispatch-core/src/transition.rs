//! Timed visual transitions
//!
//! Every transition has the same shape: a synchronous state change, a visual
//! class toggled on one or more nodes, a suspension for the configured delay,
//! then synchronous cleanup. Transitions run as tokio tasks tracked by a
//! [`TransitionTracker`] so callers can wait for the view to settle.
//!
//! Transitions on the same item are serialised through a [`TransitionGate`]:
//! an exit requested mid-enter starts only after the enter cleanup ran.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, Notify, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::view::{NodeHandle, ViewBuilder, VisualClass};

/// Suspend for `delay`. Zero returns without yielding.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Add `class` to every node, wait `delay`, then remove it again.
pub async fn flash(view: &dyn ViewBuilder, nodes: &[(NodeHandle, VisualClass)], delay: Duration) {
    for (node, class) in nodes {
        view.add_class(*node, *class);
    }
    pause(delay).await;
    for (node, class) in nodes {
        view.remove_class(*node, *class);
    }
}

/// Serialises the transitions of one item.
#[derive(Clone, Debug, Default)]
pub struct TransitionGate(Arc<AsyncMutex<()>>);

impl TransitionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate without waiting, if nobody holds it.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.0.clone().try_lock_owned().ok()
    }

    /// Wait for every earlier holder to release the gate.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.0.clone().lock_owned().await
    }

    pub fn is_busy(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

/// Counts in-flight transitions.
///
/// Transitions are never aborted: cancelling an item's subscriptions leaves
/// its running transitions alone so their cleanup always happens.
#[derive(Clone, Debug, Default)]
pub struct TransitionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    in_flight: AtomicUsize,
    idle: Notify,
}

struct InFlight(Arc<TrackerInner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a transition on the current tokio runtime.
    ///
    /// Returns false (and drops the transition) when called outside a runtime.
    pub fn spawn<F>(&self, label: &'static str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!(transition = label, "no tokio runtime, transition dropped");
            return false;
        };

        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self.inner.clone());
        debug!(transition = label, "transition started");
        handle.spawn(async move {
            let _guard = guard;
            future.await;
            debug!(transition = label, "transition finished");
        });
        true
    }

    /// Number of transitions still running
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no transition is running, including ones spawned while waiting.
    pub async fn settle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}
