//! Process-wide shutdown coordination.
//!
//! `Running -> ShuttingDown -> Stopped`. Any session may trigger the first
//! transition; the acceptor performs the second once in-flight sessions have
//! drained. Shared as `Arc<Shutdown>`.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug)]
pub struct Shutdown {
    state: AtomicU8,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            notify: Notify::new(),
        }
    }

    /// Request shutdown. Returns `true` only for the call that moved the state
    /// out of `Running`; later calls are no-ops.
    pub fn trigger(&self) -> bool {
        let first = self
            .state
            .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn should_stop(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }

    pub fn state(&self) -> ShutdownState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => ShutdownState::Running,
            SHUTTING_DOWN => ShutdownState::ShuttingDown,
            _ => ShutdownState::Stopped,
        }
    }

    /// Resolves once shutdown has been triggered.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent trigger is not missed.
            notified.as_mut().enable();
            if self.should_stop() {
                return;
            }
            notified.await;
        }
    }

    /// Final transition, taken by the acceptor after draining sessions.
    pub fn mark_stopped(&self) {
        self.state.store(STOPPED, Ordering::Release);
        self.notify.notify_waiters();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_initial_state() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.state(), ShutdownState::Running);
        assert!(!shutdown.should_stop());
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert_eq!(shutdown.state(), ShutdownState::ShuttingDown);

        shutdown.mark_stopped();
        assert!(!shutdown.trigger());
        assert_eq!(shutdown.state(), ShutdownState::Stopped);
        assert!(shutdown.should_stop());
    }

    #[test]
    fn test_concurrent_trigger_has_one_winner() {
        let shutdown = Arc::new(Shutdown::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shutdown = Arc::clone(&shutdown);
                std::thread::spawn(move || shutdown.trigger())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_trigger() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.wait().await })
        };

        tokio::task::yield_now().await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("already triggered");
    }
}
