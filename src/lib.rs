#![doc = include_str!("../README.md")]
#![warn(missing_docs, missing_debug_implementations)]
extern crate alloc;
mod allocator;
mod block;
mod builder;
mod error;
mod handle;
mod locking;
mod pool;
mod state;

pub use allocator::{DefaultAllocator, FnAllocator, PolicyAllocator, ResourceAllocator};
pub use builder::PoolBuilder;
pub use error::BuildError;
pub use handle::Handle;
pub use locking::*;
pub use pool::{ResourcePool, DEFAULT_CAPACITY};
