use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Blocking counting semaphore bounding how many chunk tasks run at once.
pub(super) struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// A held permit; dropping it returns the permit, also when the chunk task panics.
pub(super) struct Permit<'a> {
    sem: &'a Semaphore,
    waited: Duration,
}

impl Permit<'_> {
    /// Time spent blocked before the permit was granted.
    pub(super) fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut free = self.sem.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *free += 1;
        self.sem.cv.notify_one();
    }
}

impl Semaphore {
    /// `permits` is clamped to at least 1.
    pub(super) fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits.max(1)),
            cv: Condvar::new(),
        }
    }

    pub(super) fn acquire(&self) -> Permit<'_> {
        let mut free = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        let mut waited = Duration::ZERO;
        if *free == 0 {
            let start = Instant::now();
            while *free == 0 {
                free = self.cv.wait(free).unwrap_or_else(PoisonError::into_inner);
            }
            waited = start.elapsed();
        }
        *free -= 1;
        Permit { sem: self, waited }
    }
}
