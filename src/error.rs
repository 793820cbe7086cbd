//! Error types for pool and memory-object operations
//!
//! Failures a correct caller can hit at runtime (pool exhaustion,
//! unsatisfiable object sizes, bad pool configuration) are `Result` errors.
//! Contract violations — out-of-range offsets, reference-count underflow,
//! freeing a handle into a foreign pool — are panics; see the per-method
//! documentation on [`crate::MemObj`].

use thiserror::Error;

/// Errors raised while constructing a [`crate::BlockPool`] or
/// [`crate::MemObjPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolInitError {
    /// The configured block size cannot hold the chunk link word, the head
    /// metadata and at least one payload byte.
    #[error("block size {size} is below the minimum of {min} bytes")]
    BlockSizeTooSmall {
        /// Requested block size in bytes.
        size: usize,
        /// Smallest supported block size.
        min: usize,
    },

    /// The block count is zero or exceeds what a block index can address.
    #[error("block count {count} is outside the supported range 1..={max}")]
    InvalidBlockCount {
        /// Requested number of blocks.
        count: usize,
        /// Largest supported block count.
        max: usize,
    },

    /// `block_size * block_count` does not fit in the address space.
    #[error("arena of {block_count} blocks x {block_size} bytes overflows the address space")]
    ArenaTooLarge {
        /// Requested block size in bytes.
        block_size: usize,
        /// Requested number of blocks.
        block_count: usize,
    },
}

/// Errors raised by [`crate::MemObjPool::alloc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The block pool ran out of blocks before the whole chain could be
    /// drawn. The partial chain has already been rolled back; the pool's
    /// free count is exactly what it was before the call.
    #[error("pool exhausted: {requested}-byte object needs {chunks} chunks, {available} blocks free")]
    OutOfBlocks {
        /// Requested object size in bytes.
        requested: usize,
        /// Number of chunks the object would have needed.
        chunks: usize,
        /// Snapshot of the pool's free count taken after rollback. With no
        /// concurrent pool traffic this equals the pre-call count; other
        /// contexts allocating or freeing in the meantime can move it.
        available: usize,
    },

    /// The requested size needs more chunks than a chain can carry.
    #[error("{requested}-byte object exceeds the largest supported size of {max_bytes} bytes")]
    TooLarge {
        /// Requested object size in bytes.
        requested: usize,
        /// Largest object this pool can represent.
        max_bytes: usize,
    },
}
