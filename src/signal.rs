//! Cooperative stop signalling for active-plugin workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// One-shot stop flag handed to every worker.
///
/// Workers are expected to observe the signal at least once per minute of
/// wall clock. Once set, the signal stays set.
#[derive(Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Request stop. Wakes every waiter; later waits return immediately.
    pub fn set(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Check the flag without waiting (hot path).
    #[inline]
    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Wait until the signal is set.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before the final flag check so a concurrent
            // `set` between check and await cannot be missed.
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Wait up to `timeout` for the signal.
    ///
    /// Returns `true` if the signal was set before the deadline, `false` on
    /// timeout. Workers use this as their cadence wait: "sleep up to the
    /// refresh interval or until stopped".
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_before_wait_returns_immediately() {
        let signal = StopSignal::new();
        signal.set();
        assert!(signal.is_set());
        signal.wait().await;
    }

    #[tokio::test]
    async fn wait_wakes_on_set() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::task::yield_now().await;
        signal.set();
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_reports_outcome() {
        let signal = Arc::new(StopSignal::new());
        assert!(!signal.wait_timeout(Duration::from_secs(5)).await);

        signal.set();
        assert!(signal.wait_timeout(Duration::from_secs(5)).await);
    }
}
