use crate::block::{ControlBlock, RawBlock};
use crate::locking::{LockingPolicy, RefCount};
use crate::state::PoolState;
use alloc::{boxed::Box, fmt, sync::Weak};
use core::{
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem::ManuallyDrop,
    ops::Deref,
    ptr::NonNull,
};
use tracing::trace;

/// A reference-counted handle to a resource checked out of a
/// [`ResourcePool`](crate::ResourcePool).
///
/// Cloning a handle shares the same resource. When the last clone is dropped
/// the resource goes back to the pool it came from, or is dropped if that pool
/// no longer exists. The handle's own bookkeeping memory is recycled as well.
///
/// Handles only give shared access to the resource; use [`Handle::get_mut`]
/// while the handle is unique.
pub struct Handle<T, P: LockingPolicy> {
    ptr: NonNull<ControlBlock<T, P>>,
    _marker: PhantomData<ControlBlock<T, P>>,
}

// The control block is shared between clones that may live on different
// threads, exactly like the inner value of an `Arc`. Releasing the last clone
// runs the pool's recycle hook on the releasing thread.
unsafe impl<T, P> Send for Handle<T, P>
where
    T: Send + Sync,
    P: LockingPolicy,
    P::RawMutex: Send + Sync,
    P::RefCount: Send + Sync,
    P::SharedAllocator<T>: Send + Sync,
{
}

unsafe impl<T, P> Sync for Handle<T, P>
where
    T: Send + Sync,
    P: LockingPolicy,
    P::RawMutex: Send + Sync,
    P::RefCount: Send + Sync,
    P::SharedAllocator<T>: Send + Sync,
{
}

impl<T, P: LockingPolicy> Handle<T, P> {
    pub(crate) fn new(
        block: RawBlock<T, P>,
        resource: Box<T>,
        pool: Weak<PoolState<T, P>>,
    ) -> Self {
        Handle {
            ptr: ControlBlock::new(pool, resource).install(block),
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    fn block(&self) -> &ControlBlock<T, P> {
        // The block stays initialized for as long as any clone exists.
        unsafe { self.ptr.as_ref() }
    }

    /// Returns a mutable reference to the resource if no other handle shares
    /// it.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.block().refs.load() == 1 {
            // Unique, and `this` is borrowed mutably.
            Some(unsafe { &mut *(*this.ptr.as_ptr()).resource })
        } else {
            None
        }
    }

    /// Number of handles sharing this resource.
    pub fn strong_count(this: &Self) -> usize {
        this.block().refs.load()
    }

    /// Returns `true` if both handles share the same resource.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Address of the resource. Stays the same while the resource moves
    /// between handles and the pool's free list.
    pub fn as_ptr(this: &Self) -> *const T {
        &**this
    }

    /// Takes the resource out of a unique handle without returning it to the
    /// pool.
    ///
    /// Returns the handle unchanged if it is shared. The resource does not
    /// go through the pool's recycle hook.
    pub fn detach(this: Self) -> Result<T, Self> {
        if Self::strong_count(&this) != 1 {
            return Err(this);
        }
        let this = ManuallyDrop::new(this);
        // Unique owner, and `Drop` will not run for `this`.
        let (block, raw) = unsafe { ControlBlock::vacate(this.ptr) };
        let ControlBlock { pool, resource, .. } = block;
        if let Some(pool) = pool.upgrade() {
            pool.release_block(raw);
        }
        Ok(*resource)
    }

    #[cfg(test)]
    pub(crate) fn block_ptr(this: &Self) -> *const () {
        this.ptr.as_ptr().cast_const().cast()
    }
}

impl<T, P: LockingPolicy> Clone for Handle<T, P> {
    #[inline]
    fn clone(&self) -> Self {
        self.block().refs.increment();
        Handle {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T, P: LockingPolicy> Deref for Handle<T, P> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.block().resource
    }
}

/// Releases the resource once the last handle is dropped.
impl<T, P: LockingPolicy> Drop for Handle<T, P> {
    fn drop(&mut self) {
        if !self.block().refs.decrement() {
            return;
        }
        // That was the last handle, nothing else can reach the block.
        let (block, raw) = unsafe { ControlBlock::vacate(self.ptr) };
        let ControlBlock { pool, resource, .. } = block;

        // The resource is consumed on both paths, so its last strong owner is
        // gone by the time the block is handed back.
        match pool.upgrade() {
            Some(pool) => {
                pool.recycle(resource);
                pool.release_block(raw);
            }
            None => {
                trace!("pool dropped before its handle, destroying resource");
                drop(resource);
            }
        }
    }
}

impl<T: Hash, P: LockingPolicy> Hash for Handle<T, P> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state);
    }
}
impl<T: fmt::Display, P: LockingPolicy> fmt::Display for Handle<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}
impl<T: fmt::Debug, P: LockingPolicy> fmt::Debug for Handle<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
impl<T, P: LockingPolicy> fmt::Pointer for Handle<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::as_ptr(self), f)
    }
}
impl<T: PartialEq, P: LockingPolicy> PartialEq for Handle<T, P> {
    #[inline]
    fn eq(&self, other: &Handle<T, P>) -> bool {
        (**self).eq(&**other)
    }
}
impl<T: Eq, P: LockingPolicy> Eq for Handle<T, P> {}
impl<T: PartialOrd, P: LockingPolicy> PartialOrd for Handle<T, P> {
    #[inline]
    fn partial_cmp(&self, other: &Handle<T, P>) -> Option<core::cmp::Ordering> {
        (**self).partial_cmp(&**other)
    }
}
impl<T: Ord, P: LockingPolicy> Ord for Handle<T, P> {
    #[inline]
    fn cmp(&self, other: &Handle<T, P>) -> core::cmp::Ordering {
        (**self).cmp(&**other)
    }
}
impl<T, P: LockingPolicy> core::borrow::Borrow<T> for Handle<T, P> {
    #[inline(always)]
    fn borrow(&self) -> &T {
        self
    }
}
impl<T, P: LockingPolicy> AsRef<T> for Handle<T, P> {
    #[inline(always)]
    fn as_ref(&self) -> &T {
        self
    }
}
