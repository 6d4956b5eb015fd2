//! Map entry record budget.
//!
//! A domain keeps its records in its own arena; the pool only decides
//! whether another record may exist. Acquisition happens before the domain
//! lock is taken, so a pool is the only place an allocation may block.

use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Source of map entry records.
pub trait EntryPool {
    /// Take one record. With `can_block` the pool may wait for a release.
    ///
    /// Returns `false` if no record is available.
    fn acquire(&self, can_block: bool) -> bool;

    /// Return a record taken with [`acquire`](Self::acquire).
    fn release(&self);
}

/// Pool without a limit; only the global allocator bounds it.
#[derive(Debug, Default, Copy, Clone)]
pub struct UnboundedPool;

impl EntryPool for UnboundedPool {
    #[inline]
    fn acquire(&self, _can_block: bool) -> bool {
        true
    }

    #[inline]
    fn release(&self) {}
}

/// Pool with a fixed number of records.
///
/// Blocking acquisitions spin until another thread releases a record.
#[derive(Debug)]
pub struct BoundedPool {
    available: AtomicUsize,
}

impl BoundedPool {
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            available: AtomicUsize::new(capacity),
        }
    }

    /// Records currently available.
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    fn try_take(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl EntryPool for BoundedPool {
    fn acquire(&self, can_block: bool) -> bool {
        loop {
            if self.try_take() {
                return true;
            }
            if !can_block {
                return false;
            }
            while self.available.load(Ordering::Relaxed) == 0 {
                spin_loop();
            }
        }
    }

    fn release(&self) {
        self.available.fetch_add(1, Ordering::AcqRel);
    }
}

impl<P: EntryPool + ?Sized> EntryPool for &P {
    fn acquire(&self, can_block: bool) -> bool {
        (**self).acquire(can_block)
    }

    fn release(&self) {
        (**self).release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_pool_exhausts_and_recovers() {
        let pool = BoundedPool::new(2);
        assert!(pool.acquire(false));
        assert!(pool.acquire(false));
        assert!(!pool.acquire(false));
        pool.release();
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire(true));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn blocking_acquire_waits_for_release() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(BoundedPool::new(0));
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire(true))
        };
        thread::yield_now();
        pool.release();
        assert!(waiter.join().unwrap());
        assert_eq!(pool.available(), 0);
    }
}
