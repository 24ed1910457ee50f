//! A cloneable, idempotent cancellation signal shared by every task in the
//! datagram service, the guard's reset timer, and the status endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct State {
    initiated: AtomicBool,
    notify: Notify,
}

/// A handle that any task can clone, hold across a `tokio::select!`, and use
/// to either trigger or observe shutdown.
///
/// Calling [`ShutdownSignal::shutdown`] more than once is harmless: only the
/// first call flips the flag and wakes waiters, subsequent calls are no-ops.
#[derive(Clone)]
pub struct ShutdownSignal {
    state: Arc<State>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(State {
                initiated: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Triggers shutdown, waking every task parked in [`cancelled`](Self::cancelled).
    pub fn shutdown(&self) {
        if !self.state.initiated.swap(true, Ordering::AcqRel) {
            self.state.notify.notify_waiters();
        }
    }

    /// Returns `true` if shutdown has already been triggered.
    pub fn is_shutdown(&self) -> bool {
        self.state.initiated.load(Ordering::Acquire)
    }

    /// Resolves once shutdown has been triggered. Safe to await repeatedly
    /// and from multiple clones; intended as a branch in `tokio::select!`.
    pub async fn cancelled(&self) {
        if self.is_shutdown() {
            return;
        }
        // Notify:notified() must be constructed before the is_shutdown()
        // recheck to avoid missing a wakeup that lands between the check
        // above and the call below.
        let notified = self.state.notify.notified();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_after_shutdown() {
        let sig = ShutdownSignal::new();
        let waiter = sig.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        sig.shutdown();
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("task should finish after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let sig = ShutdownSignal::new();
        sig.shutdown();
        sig.shutdown();
        assert!(sig.is_shutdown());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_if_already_shutdown() {
        let sig = ShutdownSignal::new();
        sig.shutdown();
        tokio::time::timeout(Duration::from_millis(50), sig.cancelled())
            .await
            .expect("cancelled() must not block once already shut down");
    }
}
