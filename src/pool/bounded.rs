use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::pool::{Lease, PoolStats, RecyclerPool};

/// Fixed-capacity shared queue; values released into a full queue are dropped.
pub struct Bounded<T> {
    queue: ArrayQueue<T>,
    stats: Arc<PoolStats>,
}

impl<T: Default> Bounded<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            stats: Arc::new(PoolStats::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Values currently waiting in the queue.
    pub fn retained(&self) -> usize {
        self.queue.len()
    }
}

impl<T: Default + Send> RecyclerPool<T> for Bounded<T> {
    fn acquire(&self) -> Lease<T> {
        match self.queue.pop() {
            Some(value) => {
                self.stats.record_reused();
                Lease::new(value)
            }
            None => {
                self.stats.record_created();
                Lease::new(T::default())
            }
        }
    }

    fn release(&self, lease: Lease<T>) {
        if self.queue.push(lease.into_value()).is_err() {
            self.stats.record_dropped();
        }
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl<T> std::fmt::Debug for Bounded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bounded")
            .field("capacity", &self.queue.capacity())
            .field("retained", &self.queue.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_overflow_is_dropped() {
        let pool = Bounded::<Vec<u8>>::new(2);
        let leases: Vec<_> = (0..3).map(|_| pool.acquire()).collect();
        for lease in leases {
            pool.release(lease);
        }
        assert_eq!(pool.retained(), 2);
        assert_eq!(pool.stats().dropped(), 1);
        assert_eq!(pool.capacity(), 2);
    }

    #[rstest::rstest]
    fn test_shared_across_threads() {
        let pool = Bounded::<Vec<u8>>::new(8);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        let mut lease = pool.acquire();
                        lease.value_mut().clear();
                        lease.value_mut().push(7);
                        pool.release(lease);
                    }
                });
            }
        });
        let counts = pool.stats().snapshot();
        assert_eq!(counts.created + counts.reused, 400);
        assert!(counts.created <= 4);
    }
}
