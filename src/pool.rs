use crate::allocator::{DefaultAllocator, PolicyAllocator};
use crate::builder::PoolBuilder;
use crate::handle::Handle;
use crate::locking::{LockingPolicy, NoLocking};
use crate::state::{PoolState, SharedAllocator};
use alloc::{fmt, sync::Arc};

/// Number of idle resources a pool keeps unless told otherwise.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// A pool of reusable resources.
///
/// [`allocate`](Self::allocate) hands out a [`Handle`]. When the last clone of
/// that handle is dropped, the resource is recycled back into the pool, ready
/// for the next `allocate` call. The pool keeps at most
/// [`capacity`](Self::capacity) idle resources; anything released beyond that
/// is dropped.
///
/// The locking policy `P` decides whether the pool can be shared between
/// threads: [`NoLocking`] (the default) for single-threaded use,
/// [`MutexLocking`](crate::MutexLocking) for concurrent use.
///
/// Cloning a pool creates an independent pool with the same configuration,
/// holding as many freshly constructed idle resources as the original does.
pub struct ResourcePool<T, P: LockingPolicy = NoLocking> {
    state: Arc<PoolState<T, P>>,
}

impl<T, P: LockingPolicy> ResourcePool<T, P> {
    /// Creates an empty pool with [`DEFAULT_CAPACITY`].
    pub fn new<A>(allocator: A) -> Self
    where
        A: PolicyAllocator<T, P>,
    {
        Self::with_capacity(DEFAULT_CAPACITY, allocator)
    }

    /// Creates an empty pool that keeps at most `capacity` idle resources.
    pub fn with_capacity<A>(capacity: usize, allocator: A) -> Self
    where
        A: PolicyAllocator<T, P>,
    {
        Self::from_shared(capacity, allocator.into_shared())
    }

    /// Creates a pool and immediately fills it with `capacity` resources
    /// created by the allocator.
    pub fn new_prefilled<A>(capacity: usize, allocator: A) -> Self
    where
        A: PolicyAllocator<T, P>,
    {
        let pool = Self::with_capacity(capacity, allocator);
        pool.state.prefill(capacity);
        pool
    }

    pub(crate) fn from_shared(capacity: usize, allocator: SharedAllocator<T, P>) -> Self {
        ResourcePool {
            state: Arc::new(PoolState::new(allocator, capacity)),
        }
    }

    pub(crate) fn prefill(&self, count: usize) {
        self.state.prefill(count);
    }

    /// Returns a builder for configuring a pool from closures.
    pub fn builder() -> PoolBuilder<T, P> {
        PoolBuilder::new()
    }

    /// Gets a resource from the pool.
    ///
    /// The most recently recycled resource is handed out first. If the pool
    /// is empty, a new resource is created by the allocator without holding
    /// the pool lock.
    pub fn allocate(&self) -> Handle<T, P> {
        self.state.allocate()
    }

    /// Attempts to get an idle resource from the pool.
    ///
    /// If the pool is empty, `None` is returned and nothing is constructed.
    pub fn try_allocate(&self) -> Option<Handle<T, P>> {
        self.state.try_reuse()
    }

    /// Gets an idle resource, or builds one with `construct` if the pool is
    /// empty.
    ///
    /// An error from `construct` is returned unchanged and leaves the pool as
    /// it was.
    pub fn try_allocate_with<E, F>(&self, construct: F) -> Result<Handle<T, P>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.state.try_allocate_with(construct)
    }

    /// Gets the number of idle resources ready to be handed out.
    pub fn unused_resources(&self) -> usize {
        self.state.unused_resources()
    }

    /// Drops every idle resource along with the cached bookkeeping memory.
    ///
    /// Resources currently held through handles are not affected and will
    /// still be recycled when released.
    pub fn free_unused(&self) {
        self.state.free_unused();
    }

    /// Gets the maximum number of idle resources the pool keeps. This does
    /// not limit how many resources can be allocated at once.
    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }
}

impl<T, P: LockingPolicy> Clone for ResourcePool<T, P> {
    fn clone(&self) -> Self {
        ResourcePool {
            state: Arc::new(self.state.duplicate()),
        }
    }
}

impl<T, P> Default for ResourcePool<T, P>
where
    T: Default,
    P: LockingPolicy,
    DefaultAllocator: PolicyAllocator<T, P>,
{
    fn default() -> Self {
        Self::new(DefaultAllocator)
    }
}

impl<T, P: LockingPolicy> fmt::Debug for ResourcePool<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("capacity", &self.capacity())
            .field("unused_resources", &self.unused_resources())
            .finish()
    }
}
