//! Coordinated shutdown signal.
//!
//! Cloned into every capture worker. Backoff waits sleep on the signal, so a quit
//! request wakes a worker immediately instead of after its current backoff. The
//! per-frame check is a single atomic load; the lock is only taken by waiters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Signal {
    triggered: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Signal>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn trigger(&self) {
        // Store under the lock so a waiter cannot miss the wakeup between its
        // check and its wait.
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for `timeout` or until shutdown is requested.
    ///
    /// Returns `true` when shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.is_triggered() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .inner
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_times_out_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(5)));
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn trigger_wakes_waiter_early() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();

        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn trigger_is_visible_to_every_clone() {
        let shutdown = Shutdown::new();
        let clones: Vec<_> = (0..4).map(|_| shutdown.clone()).collect();
        assert!(clones.iter().all(|c| !c.is_triggered()));

        clones[2].trigger();
        assert!(shutdown.is_triggered());
        assert!(clones.iter().all(Shutdown::is_triggered));
    }

    #[test]
    fn wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.wait_timeout(Duration::from_secs(30)));
    }
}
