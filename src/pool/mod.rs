//! Recycling of reader and writer state across documents.
//!
//! A pool hands out a [`Lease`] holding a reusable value; the caller owns it
//! exclusively until it is released. Every strategy implements
//! [`RecyclerPool`], and [`PoolStrategy`] selects one at runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

mod bounded;
mod confined;
mod hybrid;
mod recycler;
mod striped;

pub use bounded::Bounded;
pub use confined::OwnerConfined;
pub use hybrid::{current_context, ContextProbe, ExecutionContext, Hybrid};
pub use recycler::{PooledReader, PooledWriter, Recycler};
pub use striped::Striped;

pub const DEFAULT_BOUNDED_CAPACITY: usize = 64;

pub const DEFAULT_STRIPES: usize = 8;

/// Compare-and-set attempts before a striped pool gives up on a stripe.
pub const MAX_CAS_RETRIES: usize = 16;

pub trait RecyclerPool<T>: Send + Sync {
    fn acquire(&self) -> Lease<T>;

    fn release(&self, lease: Lease<T>);

    fn stats(&self) -> &PoolStats;
}

/// A pooled value plus the stripe it belongs to. The stripe is assigned when
/// the value is created and kept for its whole life.
#[derive(Debug)]
pub struct Lease<T> {
    value: T,
    stripe: Option<usize>,
}

impl<T> Lease<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            stripe: None,
        }
    }

    pub fn on_stripe(value: T, stripe: usize) -> Self {
        Self {
            value,
            stripe: Some(stripe),
        }
    }

    pub fn stripe(&self) -> Option<usize> {
        self.stripe
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Splits the lease so the value can be lent out and rejoined later.
    pub(crate) fn into_parts(self) -> (T, Option<usize>) {
        (self.value, self.stripe)
    }

    pub(crate) fn from_parts(value: T, stripe: Option<usize>) -> Self {
        Self { value, stripe }
    }
}

/// Counters shared by a pool and, for `Hybrid`, its inner pools.
#[derive(Debug, Default)]
pub struct PoolStats {
    created: AtomicU64,
    reused: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolCounts {
    pub created: u64,
    pub reused: u64,
    pub dropped: u64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values built because the pool had nothing to hand out.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    /// Released values the pool could not retain.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PoolCounts {
        PoolCounts {
            created: self.created(),
            reused: self.reused(),
            dropped: self.dropped(),
        }
    }

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Always builds a fresh value and lets released ones go.
#[derive(Debug, Default)]
pub struct NonRecycling {
    stats: Arc<PoolStats>,
}

impl NonRecycling {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Default> RecyclerPool<T> for NonRecycling {
    fn acquire(&self) -> Lease<T> {
        self.stats.record_created();
        Lease::new(T::default())
    }

    fn release(&self, lease: Lease<T>) {
        self.stats.record_dropped();
        drop(lease);
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

#[derive(Debug)]
pub enum PoolStrategy<T> {
    NonRecycling(NonRecycling),
    OwnerConfined(OwnerConfined<T>),
    Bounded(Bounded<T>),
    Striped(Striped<T>),
    Hybrid(Hybrid<T>),
}

impl<T: Default + Send + 'static> PoolStrategy<T> {
    pub fn non_recycling() -> Self {
        Self::NonRecycling(NonRecycling::new())
    }

    pub fn owner_confined() -> Self {
        Self::OwnerConfined(OwnerConfined::new())
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::Bounded(Bounded::new(capacity))
    }

    pub fn striped(stripes: usize) -> Self {
        Self::Striped(Striped::new(stripes))
    }

    pub fn hybrid() -> Self {
        Self::Hybrid(Hybrid::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NonRecycling(_) => "non-recycling",
            Self::OwnerConfined(_) => "owner-confined",
            Self::Bounded(_) => "bounded",
            Self::Striped(_) => "striped",
            Self::Hybrid(_) => "hybrid",
        }
    }
}

impl<T: Default + Send + 'static> Default for PoolStrategy<T> {
    fn default() -> Self {
        Self::hybrid()
    }
}

impl<T: Default + Send + 'static> RecyclerPool<T> for PoolStrategy<T> {
    fn acquire(&self) -> Lease<T> {
        match self {
            Self::NonRecycling(pool) => pool.acquire(),
            Self::OwnerConfined(pool) => pool.acquire(),
            Self::Bounded(pool) => pool.acquire(),
            Self::Striped(pool) => pool.acquire(),
            Self::Hybrid(pool) => pool.acquire(),
        }
    }

    fn release(&self, lease: Lease<T>) {
        match self {
            Self::NonRecycling(pool) => pool.release(lease),
            Self::OwnerConfined(pool) => pool.release(lease),
            Self::Bounded(pool) => pool.release(lease),
            Self::Striped(pool) => pool.release(lease),
            Self::Hybrid(pool) => pool.release(lease),
        }
    }

    fn stats(&self) -> &PoolStats {
        match self {
            Self::NonRecycling(pool) => RecyclerPool::<T>::stats(pool),
            Self::OwnerConfined(pool) => pool.stats(),
            Self::Bounded(pool) => pool.stats(),
            Self::Striped(pool) => pool.stats(),
            Self::Hybrid(pool) => pool.stats(),
        }
    }
}
