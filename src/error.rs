/// Errors returned by [`PoolBuilder::build`](crate::PoolBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// No allocate function was given.
    #[error("resource pool needs an allocate function")]
    MissingAllocator,

    /// More resources were requested up front than the pool can keep.
    #[error("cannot prefill {prefill} resources into a pool with capacity {capacity}")]
    PrefillExceedsCapacity {
        /// Requested number of prefilled resources.
        prefill: usize,
        /// Configured capacity.
        capacity: usize,
    },
}
