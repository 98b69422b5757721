use crate::allocator::{FnAllocator, PolicyAllocator};
use crate::error::BuildError;
use crate::locking::{LockingPolicy, NoLocking};
use crate::pool::{ResourcePool, DEFAULT_CAPACITY};
use alloc::fmt;
use core::marker::PhantomData;

/// Builder for creating a [`ResourcePool`] from closures.
///
/// The allocate function is mandatory, whereas other settings are optional.
/// Pools using [`MutexLocking`](crate::MutexLocking) need `Send + Sync`
/// closures; single-threaded pools accept any `'static` closure.
///
/// # Examples
///
/// ```
/// use recycle_pool::{MutexLocking, ResourcePool};
///
/// let pool = ResourcePool::<Vec<u8>, MutexLocking>::builder()
///     .allocate(|| Vec::with_capacity(4096))
///     .recycle(|buffer| buffer.clear())
///     .capacity(64)
///     .prefill(8)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.unused_resources(), 8);
/// ```
#[must_use]
pub struct PoolBuilder<T, P: LockingPolicy = NoLocking, A = fn() -> T, R = fn(&mut T)> {
    allocate: Option<A>,
    recycle: Option<R>,
    capacity: usize,
    prefill: usize,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<T, P: LockingPolicy> PoolBuilder<T, P> {
    pub(crate) fn new() -> Self {
        PoolBuilder {
            allocate: None,
            recycle: None,
            capacity: DEFAULT_CAPACITY,
            prefill: 0,
            _marker: PhantomData,
        }
    }
}

impl<T, P: LockingPolicy, A, R> PoolBuilder<T, P, A, R> {
    /// Sets the function creating new resources.
    pub fn allocate<F>(self, allocate: F) -> PoolBuilder<T, P, F, R>
    where
        F: Fn() -> T,
    {
        PoolBuilder {
            allocate: Some(allocate),
            recycle: self.recycle,
            capacity: self.capacity,
            prefill: self.prefill,
            _marker: PhantomData,
        }
    }

    /// Sets the hook run on every released resource before it goes back into
    /// the pool.
    pub fn recycle<F>(self, recycle: F) -> PoolBuilder<T, P, A, F>
    where
        F: Fn(&mut T),
    {
        PoolBuilder {
            allocate: self.allocate,
            recycle: Some(recycle),
            capacity: self.capacity,
            prefill: self.prefill,
            _marker: PhantomData,
        }
    }

    /// Sets how many idle resources the pool keeps. Defaults to
    /// [`DEFAULT_CAPACITY`].
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets how many resources are created up front. Defaults to zero.
    pub fn prefill(mut self, prefill: usize) -> Self {
        self.prefill = prefill;
        self
    }

    /// Builds the pool.
    ///
    /// # Errors
    ///
    /// [`BuildError::MissingAllocator`] if no allocate function was set,
    /// [`BuildError::PrefillExceedsCapacity`] if more resources were
    /// requested up front than the pool can keep.
    pub fn build(self) -> Result<ResourcePool<T, P>, BuildError>
    where
        A: Fn() -> T,
        R: Fn(&mut T),
        FnAllocator<A, R>: PolicyAllocator<T, P>,
    {
        let allocate = self.allocate.ok_or(BuildError::MissingAllocator)?;
        if self.prefill > self.capacity {
            return Err(BuildError::PrefillExceedsCapacity {
                prefill: self.prefill,
                capacity: self.capacity,
            });
        }

        let allocator = FnAllocator {
            allocate,
            recycle: self.recycle,
        };
        let pool = ResourcePool::from_shared(self.capacity, allocator.into_shared());
        if self.prefill > 0 {
            pool.prefill(self.prefill);
        }
        Ok(pool)
    }
}

impl<T, P: LockingPolicy, A, R> fmt::Debug for PoolBuilder<T, P, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("has_allocate", &self.allocate.is_some())
            .field("has_recycle", &self.recycle.is_some())
            .field("capacity", &self.capacity)
            .field("prefill", &self.prefill)
            .finish()
    }
}
