use crate::locking::{LockingPolicy, RefCount};
use crate::state::PoolState;
use alloc::{boxed::Box, sync::Weak, vec::Vec};
use core::{mem::MaybeUninit, ptr::NonNull};

/// Bookkeeping record behind every [`Handle`](crate::Handle).
pub(crate) struct ControlBlock<T, P: LockingPolicy> {
    pub(crate) refs: P::RefCount,
    pub(crate) pool: Weak<PoolState<T, P>>,
    pub(crate) resource: Box<T>,
}

/// Memory for one control block that holds no live object.
pub(crate) type RawBlock<T, P> = Box<MaybeUninit<ControlBlock<T, P>>>;

impl<T, P: LockingPolicy> ControlBlock<T, P> {
    pub(crate) fn new(pool: Weak<PoolState<T, P>>, resource: Box<T>) -> Self {
        ControlBlock {
            refs: P::RefCount::one(),
            pool,
            resource,
        }
    }

    /// Moves the record into `block`, returning a pointer that owns both.
    pub(crate) fn install(self, mut block: RawBlock<T, P>) -> NonNull<Self> {
        block.write(self);
        NonNull::from(Box::leak(block)).cast()
    }

    /// Moves the record back out of its memory.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Self::install`] and must not be used again.
    pub(crate) unsafe fn vacate(ptr: NonNull<Self>) -> (Self, RawBlock<T, P>) {
        // MaybeUninit<Self> has the same layout as Self.
        let raw: RawBlock<T, P> =
            unsafe { Box::from_raw(ptr.cast::<MaybeUninit<Self>>().as_ptr()) };
        let record = unsafe { raw.assume_init_read() };
        (record, raw)
    }
}

/// Bounded free list of control-block memory.
///
/// Blocks come back here when handles are released and are handed out again
/// to handles wrapping a reused resource, so a warmed-up pool never touches
/// the system allocator.
pub(crate) struct BlockCache<T, P: LockingPolicy> {
    blocks: Vec<RawBlock<T, P>>,
    capacity: usize,
}

impl<T, P: LockingPolicy> BlockCache<T, P> {
    pub(crate) fn new(capacity: usize) -> Self {
        BlockCache {
            blocks: Vec::new(),
            capacity,
        }
    }

    /// Allocates a block from the system allocator.
    #[inline]
    pub(crate) fn allocate_fresh() -> RawBlock<T, P> {
        Box::new(MaybeUninit::uninit())
    }

    /// Hands out a cached block if the handle wraps a reused resource and one
    /// is available, otherwise a fresh one.
    #[inline]
    pub(crate) fn acquire(&mut self, reused: bool) -> RawBlock<T, P> {
        if reused {
            if let Some(block) = self.blocks.pop() {
                return block;
            }
        }
        Self::allocate_fresh()
    }

    /// Keeps `block` for reuse, or frees it when the cache is full.
    #[inline]
    pub(crate) fn release(&mut self, block: RawBlock<T, P>) {
        if self.blocks.len() < self.capacity {
            self.blocks.push(block);
        }
    }

    /// Removes every cached block so the caller can free them outside the lock.
    pub(crate) fn take(&mut self) -> Vec<RawBlock<T, P>> {
        core::mem::take(&mut self.blocks)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::NoLocking;

    type Cache = BlockCache<u64, NoLocking>;

    fn addr(block: &RawBlock<u64, NoLocking>) -> *const () {
        block.as_ptr().cast()
    }

    #[test]
    fn acquire_reuses_cached_block_for_reused_resources() {
        let mut cache = Cache::new(4);
        let block = Cache::allocate_fresh();
        let expected = addr(&block);
        cache.release(block);
        assert_eq!(cache.len(), 1);

        let block = cache.acquire(true);
        assert_eq!(addr(&block), expected);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn acquire_for_fresh_resource_skips_cache() {
        let mut cache = Cache::new(4);
        cache.release(Cache::allocate_fresh());
        let _block = cache.acquire(false);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn release_is_bounded_by_capacity() {
        let mut cache = Cache::new(2);
        for _ in 0..5 {
            cache.release(Cache::allocate_fresh());
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.take().len(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_capacity_never_caches() {
        let mut cache = Cache::new(0);
        cache.release(Cache::allocate_fresh());
        assert_eq!(cache.len(), 0);
    }
}
