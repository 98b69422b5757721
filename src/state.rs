use crate::allocator::ResourceAllocator;
use crate::block::{BlockCache, RawBlock};
use crate::handle::Handle;
use crate::locking::{LockingPolicy, PolicyMutex};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use tracing::{debug, trace};

pub(crate) type SharedAllocator<T, P> = Arc<<P as LockingPolicy>::SharedAllocator<T>>;

struct FreeLists<T, P: LockingPolicy> {
    resources: Vec<Box<T>>,
    blocks: BlockCache<T, P>,
}

/// State shared by a [`ResourcePool`](crate::ResourcePool) and, weakly, by
/// every handle it issued.
///
/// The lock only ever guards the two free lists. User code (construction,
/// recycle hook, resource destructors) always runs after it is released.
pub(crate) struct PoolState<T, P: LockingPolicy> {
    allocator: SharedAllocator<T, P>,
    capacity: usize,
    lists: PolicyMutex<P, FreeLists<T, P>>,
}

impl<T, P: LockingPolicy> PoolState<T, P> {
    pub(crate) fn new(allocator: SharedAllocator<T, P>, capacity: usize) -> Self {
        Self::with_resources(allocator, capacity, Vec::new())
    }

    fn with_resources(
        allocator: SharedAllocator<T, P>,
        capacity: usize,
        resources: Vec<Box<T>>,
    ) -> Self {
        PoolState {
            allocator,
            capacity,
            lists: PolicyMutex::<P, _>::new(FreeLists {
                resources,
                blocks: BlockCache::new(capacity),
            }),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hands out the most recently recycled resource, if any.
    pub(crate) fn try_reuse(self: &Arc<Self>) -> Option<Handle<T, P>> {
        let (resource, block) = {
            let mut lists = self.lists.lock();
            let resource = lists.resources.pop()?;
            (resource, lists.blocks.acquire(true))
        };
        Some(Handle::new(block, resource, Arc::downgrade(self)))
    }

    pub(crate) fn allocate(self: &Arc<Self>) -> Handle<T, P> {
        if let Some(handle) = self.try_reuse() {
            return handle;
        }
        trace!("free list empty, constructing a new resource");
        let resource = Box::new(self.allocator.allocate());
        Handle::new(BlockCache::allocate_fresh(), resource, Arc::downgrade(self))
    }

    pub(crate) fn try_allocate_with<E, F>(
        self: &Arc<Self>,
        construct: F,
    ) -> Result<Handle<T, P>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(handle) = self.try_reuse() {
            return Ok(handle);
        }
        trace!("free list empty, constructing a new resource");
        let resource = Box::new(construct()?);
        Ok(Handle::new(BlockCache::allocate_fresh(), resource, Arc::downgrade(self)))
    }

    /// Returns a released resource to the free list, dropping it if the list
    /// is already at capacity.
    pub(crate) fn recycle(&self, mut resource: Box<T>) {
        self.allocator.recycle(&mut resource);

        let rejected = {
            let mut lists = self.lists.lock();
            if lists.resources.len() < self.capacity {
                lists.resources.push(resource);
                None
            } else {
                Some(resource)
            }
        };

        if let Some(resource) = rejected {
            trace!(capacity = self.capacity, "free list full, dropping resource");
            drop(resource);
        }
    }

    pub(crate) fn release_block(&self, block: RawBlock<T, P>) {
        self.lists.lock().blocks.release(block);
    }

    pub(crate) fn unused_resources(&self) -> usize {
        self.lists.lock().resources.len()
    }

    pub(crate) fn free_unused(&self) {
        let (resources, blocks) = {
            let mut lists = self.lists.lock();
            (core::mem::take(&mut lists.resources), lists.blocks.take())
        };
        debug!(
            resources = resources.len(),
            control_blocks = blocks.len(),
            "freeing unused resources"
        );
    }

    /// Constructs `count` resources and adds as many as fit to the free list.
    pub(crate) fn prefill(&self, count: usize) {
        let mut fresh: Vec<Box<T>> = (0..count)
            .map(|_| Box::new(self.allocator.allocate()))
            .collect();
        let kept = {
            let mut lists = self.lists.lock();
            let room = self.capacity.saturating_sub(lists.resources.len());
            let kept = room.min(fresh.len());
            lists.resources.extend(fresh.drain(..kept));
            kept
        };
        debug!(count, kept, "prefilled resource pool");
    }

    /// Builds an independent state with the same configuration, seeded with
    /// as many freshly constructed resources as this one currently holds.
    pub(crate) fn duplicate(&self) -> Self {
        let idle = self.unused_resources();
        debug!(resources = idle, "duplicating resource pool");
        let resources = (0..idle)
            .map(|_| Box::new(self.allocator.allocate()))
            .collect();
        Self::with_resources(Arc::clone(&self.allocator), self.capacity, resources)
    }

    #[cfg(test)]
    pub(crate) fn cached_blocks(&self) -> usize {
        self.lists.lock().blocks.len()
    }
}
