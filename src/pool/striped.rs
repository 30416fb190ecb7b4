use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::mem::ManuallyDrop;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::epoch::{self, Atomic, Owned};

use crate::pool::{Lease, PoolStats, RecyclerPool, DEFAULT_STRIPES, MAX_CAS_RETRIES};

struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

/// Treiber stack whose push and pop give up after a bounded number of
/// compare-and-set attempts.
struct Stack<T> {
    head: Atomic<Node<T>>,
}

// SAFETY: values move in and out whole; no reference to a stored value
// escapes the stack.
unsafe impl<T: Send> Send for Stack<T> {}
unsafe impl<T: Send> Sync for Stack<T> {}

impl<T> Stack<T> {
    fn new() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// Returns the value when every attempt lost a race.
    fn try_push(&self, value: T, retries: usize) -> Result<(), T> {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });
        let guard = epoch::pin();
        for _ in 0..retries {
            let head = self.head.load(Ordering::Relaxed, &guard);
            node.next.store(head, Ordering::Relaxed);
            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => return Ok(()),
                Err(err) => node = err.new,
            }
        }
        Err(ManuallyDrop::into_inner(node.into_box().value))
    }

    /// `None` when empty or when every attempt lost a race.
    fn try_pop(&self, retries: usize) -> Option<T> {
        let guard = epoch::pin();
        for _ in 0..retries {
            let head = self.head.load(Ordering::Acquire, &guard);
            // SAFETY: the guard keeps `head` alive while pinned.
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Ordering::Relaxed, &guard);
            if self
                .head
                .compare_exchange(head, next, Ordering::Relaxed, Ordering::Relaxed, &guard)
                .is_ok()
            {
                // SAFETY: the node is unlinked, so this thread alone reads its
                // value; destruction is deferred until no guard can see it and
                // the `ManuallyDrop` keeps the value from being dropped twice.
                unsafe {
                    let value = std::ptr::read(&node.value);
                    guard.defer_destroy(head);
                    return Some(ManuallyDrop::into_inner(value));
                }
            }
        }
        None
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the nodes.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);
            while let Some(node) = current.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                let mut owned = current.into_owned();
                ManuallyDrop::drop(&mut owned.value);
                current = next;
            }
        }
    }
}

/// Several lock-free stacks, picked by the identity of the calling thread or
/// task. A lost compare-and-set race falls back to building (or dropping) a
/// value instead of spinning.
pub struct Striped<T> {
    stripes: Box<[Stack<T>]>,
    retries: usize,
    stats: Arc<PoolStats>,
}

impl<T: Default + Send> Striped<T> {
    pub fn new(stripes: usize) -> Self {
        Self::with_stats(stripes, Arc::new(PoolStats::new()))
    }

    pub(crate) fn with_stats(stripes: usize, stats: Arc<PoolStats>) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Stack::new()).collect(),
            retries: MAX_CAS_RETRIES,
            stats,
        }
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe for the calling context.
    pub fn stripe_for_caller(&self) -> usize {
        let mut hasher = DefaultHasher::new();
        caller_identity(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

impl<T: Default + Send> Default for Striped<T> {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl<T: Default + Send> RecyclerPool<T> for Striped<T> {
    fn acquire(&self) -> Lease<T> {
        let stripe = self.stripe_for_caller();
        match self.stripes[stripe].try_pop(self.retries) {
            Some(value) => {
                self.stats.record_reused();
                Lease::on_stripe(value, stripe)
            }
            None => {
                self.stats.record_created();
                Lease::on_stripe(T::default(), stripe)
            }
        }
    }

    fn release(&self, lease: Lease<T>) {
        let (value, stripe) = lease.into_parts();
        let stripe = match stripe {
            Some(stripe) if stripe < self.stripes.len() => stripe,
            _ => self.stripe_for_caller(),
        };
        if self.stripes[stripe].try_push(value, self.retries).is_err() {
            tracing::debug!(stripe, "stripe contended; dropping pooled value");
            self.stats.record_dropped();
        }
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl<T> std::fmt::Debug for Striped<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Striped")
            .field("stripes", &self.stripes.len())
            .field("retries", &self.retries)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(feature = "tokio")]
fn caller_identity(hasher: &mut DefaultHasher) {
    match tokio::task::try_id() {
        Some(task) => task.hash(hasher),
        None => std::thread::current().id().hash(hasher),
    }
}

#[cfg(not(feature = "tokio"))]
fn caller_identity(hasher: &mut DefaultHasher) {
    std::thread::current().id().hash(hasher);
}
