use crate::locking::{LockingPolicy, MutexLocking, NoLocking};
use alloc::{fmt, sync::Arc};

/// Constructs the resources held by a pool and prepares them for reuse.
///
/// Any `Fn() -> T` closure is a `ResourceAllocator<T>` with no recycle logic.
pub trait ResourceAllocator<T> {
    /// Creates a new resource.
    ///
    /// Called only when the pool has no idle resource to hand out, and never
    /// while the pool is locked. A panic here propagates to the caller of
    /// `allocate` and leaves the pool untouched.
    fn allocate(&self) -> T;

    /// Prepares a released resource before it re-enters the pool, e.g. by
    /// clearing a buffer or closing a file.
    ///
    /// By default, this method does nothing. It runs outside the pool lock,
    /// and also runs when the pool turns out to be full and drops the resource.
    #[inline(always)]
    fn recycle(&self, _resource: &mut T) {}
}

impl<T, F> ResourceAllocator<T> for F
where
    F: Fn() -> T,
{
    #[inline(always)]
    fn allocate(&self) -> T {
        self()
    }
}

/// Allocator constructing resources with [`Default::default`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAllocator;

impl<T: Default> ResourceAllocator<T> for DefaultAllocator {
    #[inline(always)]
    fn allocate(&self) -> T {
        T::default()
    }
}

/// An allocator a pool with locking policy `P` can hold.
///
/// Every `'static` allocator qualifies for [`NoLocking`]; [`MutexLocking`]
/// additionally requires `Send + Sync`, since released handles may run the
/// recycle hook on any thread.
pub trait PolicyAllocator<T, P: LockingPolicy>: ResourceAllocator<T> + 'static {
    /// Moves the allocator into the shared storage the pool keeps.
    fn into_shared(self) -> Arc<P::SharedAllocator<T>>;
}

impl<T, A> PolicyAllocator<T, NoLocking> for A
where
    A: ResourceAllocator<T> + 'static,
{
    fn into_shared(self) -> Arc<dyn ResourceAllocator<T>> {
        Arc::new(self)
    }
}

impl<T, A> PolicyAllocator<T, MutexLocking> for A
where
    A: ResourceAllocator<T> + Send + Sync + 'static,
{
    fn into_shared(self) -> Arc<dyn ResourceAllocator<T> + Send + Sync> {
        Arc::new(self)
    }
}

/// Allocator assembled by [`PoolBuilder`](crate::PoolBuilder) from an
/// allocate closure and an optional recycle hook.
pub struct FnAllocator<A, R> {
    pub(crate) allocate: A,
    pub(crate) recycle: Option<R>,
}

impl<A, R> fmt::Debug for FnAllocator<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAllocator")
            .field("has_recycle", &self.recycle.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, A, R> ResourceAllocator<T> for FnAllocator<A, R>
where
    A: Fn() -> T,
    R: Fn(&mut T),
{
    #[inline]
    fn allocate(&self) -> T {
        (self.allocate)()
    }

    #[inline]
    fn recycle(&self, resource: &mut T) {
        if let Some(recycle) = &self.recycle {
            recycle(resource);
        }
    }
}
