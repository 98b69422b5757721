use crate::allocator::ResourceAllocator;
use core::cell::Cell;
use core::sync::atomic::{self, AtomicUsize, Ordering};
use parking_lot::lock_api::{self, GuardNoSend, RawMutex};

/// Selects how a pool synchronizes access to its free lists and how handles
/// count their owners.
///
/// The pool logic is written once against this trait. [`NoLocking`] gives a
/// single-threaded pool without any synchronization cost, [`MutexLocking`]
/// gives a pool that can be shared between threads.
///
/// # Safety
///
/// Handles decide when a resource may be recycled and when it may be mutated
/// from the policy's reference count, so `RefCount` must uphold the contract
/// documented on [`RefCount`]. `SharedAllocator<T>` must be
/// `dyn ResourceAllocator<T>`, optionally with auto traits added.
///
/// ```compile_fail,E0200
/// use recycle_pool::{LockingPolicy, NoopRawMutex, ResourceAllocator};
/// use std::cell::Cell;
///
/// struct Unchecked;
///
/// impl LockingPolicy for Unchecked {
///     type RawMutex = NoopRawMutex;
///     type RefCount = Cell<usize>;
///     type SharedAllocator<T> = dyn ResourceAllocator<T>;
/// }
/// ```
pub unsafe trait LockingPolicy: 'static {
    /// The raw mutex guarding the pool's free lists.
    type RawMutex: RawMutex;

    /// The reference count stored in every handle's control block.
    type RefCount: RefCount;

    /// How the pool stores its allocator. Policies shared between threads
    /// require `Send + Sync` allocators, single-threaded ones accept any.
    type SharedAllocator<T>: ?Sized + ResourceAllocator<T>;
}

/// The mutex type a policy supplies for data `S`.
pub type PolicyMutex<P, S> = lock_api::Mutex<<P as LockingPolicy>::RawMutex, S>;

/// The scoped lock returned by locking a [`PolicyMutex`].
pub type PolicyGuard<'a, P, S> = lock_api::MutexGuard<'a, <P as LockingPolicy>::RawMutex, S>;

/// Locking policy for pools used from a single thread.
///
/// Pools and handles using this policy are neither `Send` nor `Sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocking;

unsafe impl LockingPolicy for NoLocking {
    type RawMutex = NoopRawMutex;
    type RefCount = Cell<usize>;
    type SharedAllocator<T> = dyn ResourceAllocator<T>;
}

/// Locking policy for pools shared between threads, backed by
/// [`parking_lot::RawMutex`] and atomic reference counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutexLocking;

unsafe impl LockingPolicy for MutexLocking {
    type RawMutex = parking_lot::RawMutex;
    type RefCount = AtomicUsize;
    type SharedAllocator<T> = dyn ResourceAllocator<T> + Send + Sync;
}

/// A raw mutex that performs no synchronization.
///
/// It still remembers whether it is held: locking it twice without unlocking
/// panics rather than handing out two guards to the same data.
#[derive(Debug)]
pub struct NoopRawMutex {
    locked: Cell<bool>,
}

unsafe impl RawMutex for NoopRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = NoopRawMutex {
        locked: Cell::new(false),
    };

    type GuardMarker = GuardNoSend;

    #[inline]
    fn lock(&self) {
        assert!(
            self.try_lock(),
            "single-threaded resource pool locked while already locked"
        );
    }

    #[inline]
    fn try_lock(&self) -> bool {
        !self.locked.replace(true)
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.locked.set(false);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.get()
    }
}

/// Owner count of a handle's control block.
///
/// A fresh count starts at one.
///
/// # Safety
///
/// `decrement` must return `true` exactly once per count, from the call that
/// removes the last owner, and that call must observe every access made
/// through the other owners. `load` must return the exact number of owners,
/// and a result of one must observe every access made through owners that
/// have since been removed. Handles recycle and hand out `&mut` access to the
/// resource based on these answers.
///
/// ```compile_fail,E0200
/// use recycle_pool::RefCount;
/// use std::cell::Cell;
///
/// struct AlwaysLast(Cell<usize>);
///
/// impl RefCount for AlwaysLast {
///     fn one() -> Self {
///         AlwaysLast(Cell::new(1))
///     }
///     fn increment(&self) {}
///     fn decrement(&self) -> bool {
///         true
///     }
///     fn load(&self) -> usize {
///         1
///     }
/// }
/// ```
pub unsafe trait RefCount {
    /// Creates a count of one.
    fn one() -> Self;

    /// Adds an owner.
    fn increment(&self);

    /// Removes an owner, returning `true` if it was the last one.
    fn decrement(&self) -> bool;

    /// Current number of owners.
    fn load(&self) -> usize;
}

const MAX_REFCOUNT: usize = isize::MAX as usize;

unsafe impl RefCount for Cell<usize> {
    #[inline]
    fn one() -> Self {
        Cell::new(1)
    }

    #[inline]
    fn increment(&self) {
        let count = self.get();
        if count >= MAX_REFCOUNT {
            std::process::abort();
        }
        self.set(count + 1);
    }

    #[inline]
    fn decrement(&self) -> bool {
        let count = self.get() - 1;
        self.set(count);
        count == 0
    }

    #[inline]
    fn load(&self) -> usize {
        self.get()
    }
}

unsafe impl RefCount for AtomicUsize {
    #[inline]
    fn one() -> Self {
        AtomicUsize::new(1)
    }

    #[inline]
    fn increment(&self) {
        // New owners are created from existing ones, so no ordering is needed
        // here. Same reasoning as `Arc::clone`.
        if self.fetch_add(1, Ordering::Relaxed) > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    #[inline]
    fn decrement(&self) -> bool {
        if self.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        // Every use of the value by other owners happens-before it is recycled.
        atomic::fence(Ordering::Acquire);
        true
    }

    #[inline]
    fn load(&self) -> usize {
        AtomicUsize::load(self, Ordering::Acquire)
    }
}
