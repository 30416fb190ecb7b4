use std::sync::{Arc, OnceLock};

use crate::pool::{
    Lease, OwnerConfined, PoolStats, RecyclerPool, Striped, DEFAULT_STRIPES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A dedicated OS thread that can hold thread-local state.
    OsThread,
    /// A lightweight task that may migrate between worker threads.
    CooperativeTask,
}

/// How a `Hybrid` pool tells callers apart.
#[derive(Debug, Clone, Copy)]
pub struct ContextProbe {
    /// Whether cooperative tasks can exist at all. Asked once per pool.
    pub supports_tasks: fn() -> bool,
    /// Classifies the calling context.
    pub current: fn() -> ExecutionContext,
}

impl Default for ContextProbe {
    fn default() -> Self {
        Self {
            supports_tasks: tasks_available,
            current: current_context,
        }
    }
}

fn tasks_available() -> bool {
    cfg!(feature = "tokio")
}

#[cfg(feature = "tokio")]
pub fn current_context() -> ExecutionContext {
    if tokio::task::try_id().is_some() {
        ExecutionContext::CooperativeTask
    } else {
        ExecutionContext::OsThread
    }
}

#[cfg(not(feature = "tokio"))]
pub fn current_context() -> ExecutionContext {
    ExecutionContext::OsThread
}

/// Thread-local retention for OS threads, striped stacks for tasks that can
/// hop between threads.
pub struct Hybrid<T> {
    confined: OwnerConfined<T>,
    striped: Striped<T>,
    probe: ContextProbe,
    tasks: OnceLock<bool>,
    stats: Arc<PoolStats>,
}

impl<T: Default + Send + 'static> Hybrid<T> {
    pub fn new() -> Self {
        Self::with_probe(ContextProbe::default())
    }

    pub fn with_probe(probe: ContextProbe) -> Self {
        let stats = Arc::new(PoolStats::new());
        Self {
            confined: OwnerConfined::with_stats(Arc::clone(&stats)),
            striped: Striped::with_stats(DEFAULT_STRIPES, Arc::clone(&stats)),
            probe,
            tasks: OnceLock::new(),
            stats,
        }
    }

    /// Context of the caller as this pool sees it.
    pub fn context(&self) -> ExecutionContext {
        let tasks = *self.tasks.get_or_init(|| {
            let supported = (self.probe.supports_tasks)();
            tracing::debug!(supported, "probed for cooperative tasks");
            supported
        });
        if tasks {
            (self.probe.current)()
        } else {
            ExecutionContext::OsThread
        }
    }
}

impl<T: Default + Send + 'static> Default for Hybrid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Send + 'static> RecyclerPool<T> for Hybrid<T> {
    fn acquire(&self) -> Lease<T> {
        match self.context() {
            ExecutionContext::OsThread => self.confined.acquire(),
            ExecutionContext::CooperativeTask => self.striped.acquire(),
        }
    }

    /// Striped leases go back to their stripe even when released from a
    /// thread, so a value never changes pools.
    fn release(&self, lease: Lease<T>) {
        match lease.stripe() {
            Some(_) => self.striped.release(lease),
            None => self.confined.release(lease),
        }
    }

    fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl<T> std::fmt::Debug for Hybrid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hybrid")
            .field("tasks", &self.tasks.get())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
