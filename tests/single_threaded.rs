use recycle_pool::*;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Allocator that counts how many resources it constructed.
#[derive(Clone, Default)]
struct CountingAllocator {
    constructed: Arc<AtomicUsize>,
}

impl CountingAllocator {
    fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

impl ResourceAllocator<Box<usize>> for CountingAllocator {
    fn allocate(&self) -> Box<usize> {
        Box::new(self.constructed.fetch_add(1, Ordering::SeqCst))
    }
}

fn counting_pool(capacity: usize) -> (ResourcePool<Box<usize>>, CountingAllocator) {
    let allocator = CountingAllocator::default();
    (ResourcePool::with_capacity(capacity, allocator.clone()), allocator)
}

#[test]
fn test_new() {
    let pool = ResourcePool::<Box<usize>>::new(|| Box::new(10));
    assert_eq!(**pool.allocate(), 10);
    assert_eq!(pool.capacity(), DEFAULT_CAPACITY);
}

#[test]
fn test_new_prefilled() {
    let allocator = CountingAllocator::default();
    let pool = ResourcePool::<Box<usize>>::new_prefilled(3, allocator.clone());
    assert_eq!(pool.unused_resources(), 3);
    assert_eq!(allocator.constructed(), 3);
    let _handle = pool.allocate();
    assert_eq!(allocator.constructed(), 3);
}

#[test]
fn test_default() {
    let pool = ResourcePool::<String>::default();
    assert_eq!(*pool.allocate(), "");
    assert_eq!(pool.unused_resources(), 1);
}

#[test]
fn test_try_allocate() {
    let (pool, allocator) = counting_pool(1);
    assert!(pool.try_allocate().is_none());
    assert_eq!(allocator.constructed(), 0);

    drop(pool.allocate());
    let handle = pool.try_allocate().unwrap();
    assert_eq!(**handle, 0);
    assert!(pool.try_allocate().is_none());
}

#[test]
fn unused_resources_never_exceed_capacity() {
    for capacity in 0..5 {
        let (pool, _) = counting_pool(capacity);
        let handles: Vec<_> = (0..8).map(|_| pool.allocate()).collect();
        for handle in handles {
            let before = pool.unused_resources();
            drop(handle);
            let after = pool.unused_resources();
            if before < capacity {
                assert_eq!(after, before + 1);
            } else {
                assert_eq!(after, before);
            }
            assert!(after <= capacity);
        }
        assert_eq!(pool.unused_resources(), capacity);
    }
}

#[test]
fn allocate_constructs_only_on_empty_free_list() {
    let (pool, allocator) = counting_pool(4);
    let a = pool.allocate();
    let b = pool.allocate();
    assert_eq!(allocator.constructed(), 2);
    drop((a, b));

    let _c = pool.allocate();
    let _d = pool.allocate();
    assert_eq!(allocator.constructed(), 2);
    assert_eq!(pool.unused_resources(), 0);

    let _e = pool.allocate();
    assert_eq!(allocator.constructed(), 3);
}

#[test]
fn released_resource_is_the_same_instance() {
    let (pool, allocator) = counting_pool(4);
    let handle = pool.allocate();
    let address = Handle::as_ptr(&handle);
    let value = **handle;
    drop(handle);

    let handle = pool.allocate();
    assert_eq!(Handle::as_ptr(&handle), address);
    assert_eq!(**handle, value);
    assert_eq!(allocator.constructed(), 1);
}

#[test]
fn most_recently_released_is_reused_first() {
    let (pool, _) = counting_pool(4);
    let a = pool.allocate();
    let b = pool.allocate();
    let (a_value, b_value) = (**a, **b);
    drop(a);
    drop(b);
    assert_eq!(**pool.allocate(), b_value);
    let _b = pool.allocate();
    assert_eq!(**pool.allocate(), a_value);
}

#[test]
fn full_pool_drops_last_released() {
    let (pool, allocator) = counting_pool(2);
    let a = pool.allocate();
    let b = pool.allocate();
    let c = pool.allocate();
    assert_eq!(allocator.constructed(), 3);
    let (a_value, b_value) = (**a, **b);

    drop(a);
    drop(b);
    drop(c);
    assert_eq!(pool.unused_resources(), 2);

    let next = pool.allocate();
    assert!(**next == a_value || **next == b_value);
    assert_eq!(allocator.constructed(), 3);
}

#[test]
fn dropping_pool_with_outstanding_handle() {
    let (pool, _) = counting_pool(4);
    let handle = pool.allocate();
    let shared = handle.clone();
    drop(pool);
    assert_eq!(**shared, 0);
    drop(handle);
    drop(shared);
}

#[test]
fn recycle_hook_runs_before_reuse() {
    let pool = ResourcePool::<Vec<u8>>::builder()
        .allocate(|| Vec::with_capacity(16))
        .recycle(|buffer| buffer.clear())
        .capacity(1)
        .build()
        .unwrap();

    let mut handle = pool.allocate();
    Handle::get_mut(&mut handle).unwrap().extend_from_slice(b"dirty");
    drop(handle);

    let handle = pool.allocate();
    assert!(handle.is_empty());
    assert!(handle.capacity() >= 16);
}

#[test]
fn recycle_hook_runs_even_when_pool_is_full() {
    let hooks = Arc::new(AtomicUsize::new(0));
    let counter = hooks.clone();
    let pool = ResourcePool::<u8>::builder()
        .allocate(|| 0)
        .recycle(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .capacity(1)
        .build()
        .unwrap();

    let a = pool.allocate();
    let b = pool.allocate();
    drop((a, b));
    assert_eq!(hooks.load(Ordering::SeqCst), 2);
    assert_eq!(pool.unused_resources(), 1);
}

struct Node(Option<Handle<Node, NoLocking>>);

#[test]
fn recycle_hook_may_release_handles_of_the_same_pool() {
    let pool = ResourcePool::<Node>::builder()
        .allocate(|| Node(None))
        .recycle(|node| {
            node.0.take();
        })
        .capacity(4)
        .build()
        .unwrap();

    let mut parent = pool.allocate();
    let child = pool.allocate();
    let child_address = Handle::as_ptr(&child);
    Handle::get_mut(&mut parent).unwrap().0 = Some(child);

    // Recycling the parent releases the child back into the same pool.
    drop(parent);
    assert_eq!(pool.unused_resources(), 2);
    let reused = pool.allocate();
    assert!(reused.0.is_none());
    assert_ne!(Handle::as_ptr(&reused), child_address);
}

#[test]
fn dropping_idle_resources_may_release_handles_of_the_same_pool() {
    let pool = ResourcePool::<Node>::with_capacity(1, || Node(None));
    let mut parent = pool.allocate();
    Handle::get_mut(&mut parent).unwrap().0 = Some(pool.allocate());
    drop(parent);
    assert_eq!(pool.unused_resources(), 1);

    // Freeing the parent releases the child after the pool lock is dropped.
    pool.free_unused();
    assert_eq!(pool.unused_resources(), 1);
    assert!(pool.allocate().0.is_none());
}

#[test]
fn free_unused_drops_idle_resources_only() {
    let (pool, allocator) = counting_pool(8);
    let held = pool.allocate();
    let idle: Vec<_> = (0..3).map(|_| pool.allocate()).collect();
    drop(idle);
    assert_eq!(pool.unused_resources(), 3);

    pool.free_unused();
    assert_eq!(pool.unused_resources(), 0);

    drop(held);
    assert_eq!(pool.unused_resources(), 1);
    let _again = pool.allocate();
    assert_eq!(allocator.constructed(), 4);
}

#[test]
fn clone_is_a_deep_copy() {
    let (pool, allocator) = counting_pool(6);
    let handles: Vec<_> = (0..4).map(|_| pool.allocate()).collect();
    let originals: Vec<_> = handles.iter().map(Handle::as_ptr).collect();
    drop(handles);
    assert_eq!(pool.unused_resources(), 4);

    let copy = pool.clone();
    assert_eq!(allocator.constructed(), 8);
    assert_eq!(copy.unused_resources(), 4);
    assert_eq!(copy.capacity(), 6);

    let copied: Vec<_> = (0..4).map(|_| copy.allocate()).collect();
    for handle in &copied {
        assert!(!originals.contains(&Handle::as_ptr(handle)));
    }
    assert_eq!(pool.unused_resources(), 4);

    pool.free_unused();
    drop(copied);
    assert_eq!(copy.unused_resources(), 4);
    assert_eq!(pool.unused_resources(), 0);
}

#[test]
fn try_allocate_with_propagates_errors() {
    let (pool, _) = counting_pool(2);
    let err = pool
        .try_allocate_with(|| Err::<Box<usize>, _>("connection refused"))
        .unwrap_err();
    assert_eq!(err, "connection refused");
    assert_eq!(pool.unused_resources(), 0);

    let handle = pool
        .try_allocate_with(|| Ok::<_, &str>(Box::new(99)))
        .unwrap();
    assert_eq!(**handle, 99);
    drop(handle);

    // A cached resource is handed out without calling the constructor.
    let handle = pool
        .try_allocate_with(|| Err::<Box<usize>, _>("unreachable"))
        .unwrap();
    assert_eq!(**handle, 99);
}

#[test]
fn panicking_constructor_leaves_pool_usable() {
    let pool = ResourcePool::<u32>::with_capacity(2, || -> u32 { panic!("no resources") });
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.allocate()));
    assert!(result.is_err());
    assert_eq!(pool.unused_resources(), 0);

    let handle = pool.try_allocate_with(|| Ok::<_, ()>(1)).unwrap();
    drop(handle);
    assert_eq!(*pool.allocate(), 1);
}

#[test]
fn single_threaded_pool_accepts_non_send_closures() {
    let constructed = Rc::new(Cell::new(0));
    let recycled = Rc::new(Cell::new(0));
    let pool = ResourcePool::<u32>::builder()
        .allocate({
            let constructed = constructed.clone();
            move || {
                constructed.set(constructed.get() + 1);
                0
            }
        })
        .recycle({
            let recycled = recycled.clone();
            move |_| recycled.set(recycled.get() + 1)
        })
        .capacity(1)
        .build()
        .unwrap();

    drop(pool.allocate());
    drop(pool.allocate());
    assert_eq!(constructed.get(), 1);
    assert_eq!(recycled.get(), 2);

    let counter = Rc::new(Cell::new(0u32));
    let pool = ResourcePool::<u32>::new(move || {
        counter.set(counter.get() + 1);
        counter.get()
    });
    assert_eq!(*pool.allocate(), 1);
}

/// Single-threaded policy defined outside the crate.
struct LocalPolicy;

unsafe impl LockingPolicy for LocalPolicy {
    type RawMutex = NoopRawMutex;
    type RefCount = Cell<usize>;
    type SharedAllocator<T> = dyn ResourceAllocator<T>;
}

impl PolicyAllocator<Box<usize>, LocalPolicy> for CountingAllocator {
    fn into_shared(self) -> Arc<dyn ResourceAllocator<Box<usize>>> {
        Arc::new(self)
    }
}

#[test]
fn custom_policy_tracks_owners() {
    let allocator = CountingAllocator::default();
    let pool = ResourcePool::<Box<usize>, LocalPolicy>::with_capacity(2, allocator.clone());

    let mut handle = pool.allocate();
    let shared = handle.clone();
    assert_eq!(Handle::strong_count(&handle), 2);
    assert!(Handle::get_mut(&mut handle).is_none());

    drop(shared);
    assert_eq!(Handle::strong_count(&handle), 1);
    assert!(Handle::get_mut(&mut handle).is_some());

    drop(handle);
    assert_eq!(pool.unused_resources(), 1);
    let _again = pool.allocate();
    assert_eq!(allocator.constructed(), 1);
}
