//! Fixed-size pool of admission permits, one per open chat.

use std::{
    sync::{Condvar, Mutex},
    time::Duration,
};

/// Counting semaphore with a deadline-bounded acquire.
///
/// Waiters park on a condition variable, so no lock is held across the wait.
#[derive(Debug)]
pub struct AdmissionPermits {
    capacity: usize,
    available: Mutex<usize>,
    released: Condvar,
}

impl AdmissionPermits {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: Mutex::new(capacity),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        *self.available.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn held(&self) -> usize {
        self.capacity - self.available()
    }

    /// Takes one permit, waiting at most `timeout` for one to be released.
    /// Returns `false` if the deadline passed without a free permit.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        let available = self.available.lock().unwrap_or_else(|p| p.into_inner());
        let (mut available, _) = self
            .released
            .wait_timeout_while(available, timeout, |available| *available == 0)
            .unwrap_or_else(|p| p.into_inner());
        if *available == 0 {
            return false;
        }
        *available -= 1;
        true
    }

    /// Returns one permit to the pool and wakes a single waiter.
    pub fn release(&self) {
        let mut available = self.available.lock().unwrap_or_else(|p| p.into_inner());
        if *available == self.capacity {
            tracing::error!(capacity = self.capacity, "permit released into a full pool");
            return;
        }
        *available += 1;
        self.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn acquire_until_exhausted() {
        let permits = AdmissionPermits::new(2);
        assert!(permits.try_acquire_for(Duration::ZERO));
        assert!(permits.try_acquire_for(Duration::ZERO));
        assert!(!permits.try_acquire_for(Duration::ZERO));
        assert_eq!(permits.available(), 0);
        assert_eq!(permits.held(), 2);
    }

    #[test]
    fn exhausted_pool_waits_for_full_timeout() {
        let permits = AdmissionPermits::new(1);
        assert!(permits.try_acquire_for(Duration::ZERO));

        let start = Instant::now();
        assert!(!permits.try_acquire_for(Duration::from_millis(200)));
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn release_wakes_waiter() {
        let permits = Arc::new(AdmissionPermits::new(1));
        assert!(permits.try_acquire_for(Duration::ZERO));

        let releaser = permits.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            releaser.release();
        });

        let start = Instant::now();
        assert!(permits.try_acquire_for(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn release_never_exceeds_capacity() {
        let permits = AdmissionPermits::new(1);
        permits.release();
        assert_eq!(permits.available(), 1);
        assert_eq!(permits.capacity(), 1);
    }
}
