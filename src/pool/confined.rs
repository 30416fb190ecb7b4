use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::pool::{Lease, PoolStats, RecyclerPool};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// One retained value per pool on this thread.
    static SLOTS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Keeps one value per OS thread. A second value released on the same thread
/// is dropped.
pub struct OwnerConfined<T> {
    id: u64,
    stats: Arc<PoolStats>,
    marker: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> OwnerConfined<T> {
    pub fn new() -> Self {
        Self::with_stats(Arc::new(PoolStats::new()))
    }

    pub(crate) fn with_stats(stats: Arc<PoolStats>) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            stats,
            marker: PhantomData,
        }
    }

    fn take(&self) -> Option<T> {
        SLOTS
            .try_with(|slots| slots.borrow_mut().remove(&self.id))
            .ok()
            .flatten()
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|slot| *slot)
    }

    /// Hands the value back when this thread already holds one.
    fn put(&self, value: T) -> Option<T> {
        let mut value = Some(value);
        let stored = SLOTS.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            if slots.contains_key(&self.id) {
                return;
            }
            if let Some(value) = value.take() {
                slots.insert(self.id, Box::new(value));
            }
        });
        if stored.is_err() {
            tracing::debug!(pool = self.id, "thread-local slot unavailable");
        }
        value
    }
}

impl<T: Default + 'static> Default for OwnerConfined<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + 'static> RecyclerPool<T> for OwnerConfined<T> {
    fn acquire(&self) -> Lease<T> {
        match self.take() {
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
        if self.put(lease.into_value()).is_some() {
            self.stats.record_dropped();
        }
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl<T> Drop for OwnerConfined<T> {
    fn drop(&mut self) {
        // Slots held by other threads go away with those threads.
        let _ = SLOTS.try_with(|slots| slots.borrow_mut().remove(&self.id));
    }
}

impl<T> std::fmt::Debug for OwnerConfined<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerConfined")
            .field("id", &self.id)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
