//! Fixed-block pool allocator
//!
//! A [`BlockPool`] pre-allocates one arena and hands out equally-sized
//! blocks from it in O(1), tracking free blocks as a stack of indices
//! guarded by a spin lock. It never allocates after construction, which
//! makes allocation latency bounded and rules out fragmentation — the
//! properties the memory-object layer on top of it depends on.
//!
//! The pool deliberately exposes only three operations to that layer:
//! [`BlockPool::alloc_block`], [`BlockPool::free_block`] and
//! [`BlockPool::element_size`].

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicU16, Ordering};

use spin::Mutex;
use tracing::{debug, trace};

use crate::error::PoolInitError;
use crate::layout::{HEAD_BYTES, LINK_BYTES, MAX_BLOCKS, POOL_ID_MASK};

/// Smallest usable block: link word, head metadata, one payload byte.
pub const MIN_BLOCK_SIZE: usize = LINK_BYTES + HEAD_BYTES + 1;

/// Source of process-unique pool identities for terminal links.
static NEXT_POOL_ID: AtomicU16 = AtomicU16::new(0);

/// Configuration for a block pool.
#[derive(Debug, Clone)]
pub struct BlockPoolConfig {
    /// Fill freshly allocated blocks with this byte, for debugging.
    pub alloc_pattern: Option<u8>,

    /// Fill freed blocks with this byte, for debugging.
    pub dealloc_pattern: Option<u8>,

    /// Scan the free stack on every free and panic on a double free.
    pub double_free_check: bool,
}

impl Default for BlockPoolConfig {
    fn default() -> Self {
        Self {
            alloc_pattern: if cfg!(debug_assertions) { Some(0xBB) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
            double_free_check: cfg!(debug_assertions),
        }
    }
}

impl BlockPoolConfig {
    /// Production configuration: no fill patterns, no free-stack scans.
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            double_free_check: false,
        }
    }

    /// Debug configuration: poison patterns and double-free detection on.
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
            double_free_check: true,
        }
    }
}

/// Free-block stack plus the statistics that must be updated under its lock.
struct FreeStack {
    slots: Box<[u16]>,
    top: usize,
    max_utilization: usize,
}

/// Fixed-size block source over one owned arena.
///
/// # Memory layout
/// ```text
/// [Block0][Block1][Block2]...[BlockN]
/// ```
/// Free blocks are recorded as indices on a stack; allocation pops,
/// deallocation pushes, so freed blocks are reused LIFO.
///
/// # Concurrency
/// `alloc_block`/`free_block` may be called from any number of contexts
/// concurrently; the free stack is the pool's only shared mutable state and
/// is serialized by its lock. The bytes of a handed-out block belong
/// exclusively to whoever holds its index until it is freed.
pub struct BlockPool {
    /// Owned arena; cells because handed-out blocks are written through
    /// shared references to the pool.
    memory: Box<[UnsafeCell<u8>]>,

    /// Size of each block in bytes.
    block_size: usize,

    /// Total number of blocks in the arena.
    block_count: usize,

    /// Stack of free block indices.
    free: Mutex<FreeStack>,

    /// Configuration, fixed at construction.
    config: BlockPoolConfig,

    /// Process-unique identity, stored in terminal chain links.
    pool_id: u16,
}

// SAFETY: the arena is only reached through block indices; the free stack
// serializes which context owns which index, and the bytes of an owned
// block are not touched by the pool itself until the block is freed.
unsafe impl Send for BlockPool {}
unsafe impl Sync for BlockPool {}

impl BlockPool {
    /// Creates a pool of `block_count` blocks of `block_size` bytes each
    /// with the default configuration.
    ///
    /// # Errors
    /// Returns [`PoolInitError`] if the block size is below
    /// [`MIN_BLOCK_SIZE`], the block count is zero or not index-encodable,
    /// or the arena size overflows.
    pub fn new(block_size: usize, block_count: usize) -> Result<Self, PoolInitError> {
        Self::with_config(block_size, block_count, BlockPoolConfig::default())
    }

    /// Creates a pool with an explicit configuration.
    pub fn with_config(
        block_size: usize,
        block_count: usize,
        config: BlockPoolConfig,
    ) -> Result<Self, PoolInitError> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(PoolInitError::BlockSizeTooSmall { size: block_size, min: MIN_BLOCK_SIZE });
        }
        if block_count == 0 || block_count > MAX_BLOCKS {
            return Err(PoolInitError::InvalidBlockCount { count: block_count, max: MAX_BLOCKS });
        }
        let total = block_size
            .checked_mul(block_count)
            .ok_or(PoolInitError::ArenaTooLarge { block_size, block_count })?;

        let fill = config.alloc_pattern.unwrap_or(0);
        let memory: Box<[UnsafeCell<u8>]> =
            (0..total).map(|_| UnsafeCell::new(fill)).collect();

        // All blocks start free; popping from the top yields index 0 first.
        let slots: Box<[u16]> = (0..block_count).rev().map(|i| i as u16).collect();
        let pool_id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed) & POOL_ID_MASK;

        debug!(block_size, block_count, pool_id, "block pool initialized");

        Ok(Self {
            memory,
            block_size,
            block_count,
            free: Mutex::new(FreeStack { slots, top: block_count, max_utilization: 0 }),
            config,
            pool_id,
        })
    }

    /// Size of each block in bytes.
    pub fn element_size(&self) -> usize {
        self.block_size
    }

    /// Total number of blocks in the pool.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Total arena capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.block_size * self.block_count
    }

    /// Number of blocks currently free.
    pub fn free_blocks(&self) -> usize {
        self.free.lock().top
    }

    /// Number of blocks currently handed out.
    pub fn used_blocks(&self) -> usize {
        self.block_count - self.free_blocks()
    }

    /// Whether the pool has no free blocks left.
    pub fn is_exhausted(&self) -> bool {
        self.free_blocks() == 0
    }

    /// High-water mark of simultaneously allocated blocks.
    pub fn max_utilization(&self) -> usize {
        self.free.lock().max_utilization
    }

    /// Identity of this pool, as stored in terminal chain links.
    pub(crate) fn pool_id(&self) -> u16 {
        self.pool_id
    }

    /// Pops one free block off the stack, or `None` when exhausted.
    pub fn alloc_block(&self) -> Option<u16> {
        let idx = {
            let mut free = self.free.lock();
            if free.top == 0 {
                return None;
            }
            free.top -= 1;
            let idx = free.slots[free.top];
            let used = self.block_count - free.top;
            if used > free.max_utilization {
                free.max_utilization = used;
            }
            idx
        };

        if let Some(pattern) = self.config.alloc_pattern {
            unsafe {
                ptr::write_bytes(self.block_ptr(idx), pattern, self.block_size);
            }
        }
        trace!(index = idx, "allocated block");
        Some(idx)
    }

    /// Pushes a block back onto the free stack.
    ///
    /// # Panics
    /// Panics if the index does not belong to this pool, if the free stack
    /// is already full, or — with `double_free_check` enabled — if the
    /// block is already free.
    pub fn free_block(&self, idx: u16) {
        assert!(
            (idx as usize) < self.block_count,
            "block index {idx} does not belong to this pool ({} blocks)",
            self.block_count
        );

        if let Some(pattern) = self.config.dealloc_pattern {
            unsafe {
                ptr::write_bytes(self.block_ptr(idx), pattern, self.block_size);
            }
        }

        let mut free = self.free.lock();
        if self.config.double_free_check {
            let already_free = free.slots[..free.top].contains(&idx);
            assert!(!already_free, "double free of block {idx}");
        }
        assert!(
            free.top < self.block_count,
            "freed a block into a pool that is already full"
        );
        let top = free.top;
        free.slots[top] = idx;
        free.top += 1;
        drop(free);

        trace!(index = idx, "freed block");
    }

    /// Raw pointer to the first byte of a block.
    ///
    /// The caller must own the block (hold its index between a successful
    /// `alloc_block` and the matching `free_block`) before touching the
    /// pointee.
    pub(crate) fn block_ptr(&self, idx: u16) -> *mut u8 {
        debug_assert!((idx as usize) < self.block_count);
        let base = self.memory.as_ptr() as *mut u8;
        unsafe { base.add(idx as usize * self.block_size) }
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> BlockPoolStats {
        let free = self.free.lock();
        BlockPoolStats {
            block_size: self.block_size,
            block_count: self.block_count,
            free_blocks: free.top,
            max_utilization: free.max_utilization,
        }
    }
}

impl core::fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockPool")
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("free_blocks", &self.free_blocks())
            .field("pool_id", &self.pool_id)
            .finish()
    }
}

/// Counters describing a pool's current and peak usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPoolStats {
    /// Size of each block in bytes.
    pub block_size: usize,
    /// Total number of blocks.
    pub block_count: usize,
    /// Blocks currently free.
    pub free_blocks: usize,
    /// Most blocks ever allocated simultaneously.
    pub max_utilization: usize,
}
