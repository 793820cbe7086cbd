//! Chunk-chain memory objects
//!
//! A [`MemObjPool`] binds a [`BlockPool`] to the memory-object layer: every
//! object it hands out is a chain of fixed-size chunks drawn from that pool,
//! presented to the caller as one linear byte buffer. The [`MemObj`] handle
//! supports offset-addressed reads and writes across the physically
//! disjoint chunks, an unconditional [`MemObj::free`], and an atomic
//! [`MemObj::acquire`]/[`MemObj::release`] reference-count pair for shared
//! ownership.

use core::ptr;
use core::sync::atomic::{AtomicU8, Ordering};

use heapless::Vec as BoundedVec;
use tracing::trace;

use crate::error::{AllocError, PoolInitError};
use crate::layout::{
    Link, CHUNK_CNT_OFFSET, HEAD_BYTES, LINK_BYTES, MAX_CHUNKS, USER_CNT_OFFSET,
};
use crate::pool::{BlockPool, BlockPoolConfig};
use crate::utils::ceil_div;

/// Reads a chunk's link word.
fn read_link(blocks: &BlockPool, block: u16) -> Link {
    let mut raw = [0u8; LINK_BYTES];
    unsafe {
        ptr::copy_nonoverlapping(blocks.block_ptr(block), raw.as_mut_ptr(), LINK_BYTES);
    }
    Link::decode(u16::from_le_bytes(raw))
}

/// Writes a chunk's link word.
fn write_link(blocks: &BlockPool, block: u16, link: Link) {
    let raw = link.encode().to_le_bytes();
    unsafe {
        ptr::copy_nonoverlapping(raw.as_ptr(), blocks.block_ptr(block), LINK_BYTES);
    }
}

/// The head chunk's reference count, viewed atomically.
///
/// The count is a lone `AtomicU8` physically separate from the chunk count
/// byte next to it, so a concurrent ±1 cannot disturb the immutable
/// metadata.
fn user_cnt(blocks: &BlockPool, head: u16) -> &AtomicU8 {
    unsafe { &*(blocks.block_ptr(head).add(USER_CNT_OFFSET) as *const AtomicU8) }
}

fn read_chunk_cnt(blocks: &BlockPool, head: u16) -> u8 {
    unsafe { *blocks.block_ptr(head).add(CHUNK_CNT_OFFSET) }
}

/// A block pool configured to serve chunk chains.
///
/// Created once at system initialization and kept for the life of the
/// process; all configuration is immutable after construction.
#[derive(Debug)]
pub struct MemObjPool {
    blocks: BlockPool,
    /// Payload bytes per chunk: block size minus the link word.
    chunk_size: usize,
}

impl MemObjPool {
    /// Creates a pool of `block_count` blocks of `block_size` bytes and
    /// binds the memory-object layer to it.
    ///
    /// # Errors
    /// Returns [`PoolInitError`] when the underlying block pool rejects the
    /// configuration.
    pub fn new(block_size: usize, block_count: usize) -> Result<Self, PoolInitError> {
        Self::with_config(block_size, block_count, BlockPoolConfig::default())
    }

    /// Creates a pool with an explicit block-pool configuration.
    pub fn with_config(
        block_size: usize,
        block_count: usize,
        config: BlockPoolConfig,
    ) -> Result<Self, PoolInitError> {
        let blocks = BlockPool::with_config(block_size, block_count, config)?;
        let chunk_size = blocks.element_size() - LINK_BYTES;
        Ok(Self { blocks, chunk_size })
    }

    /// Payload bytes each chunk contributes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of blocks currently free in the underlying pool.
    pub fn free_blocks(&self) -> usize {
        self.blocks.free_blocks()
    }

    /// The underlying block pool.
    pub fn block_pool(&self) -> &BlockPool {
        &self.blocks
    }

    /// Largest object this pool can represent, in bytes.
    pub fn max_object_size(&self) -> usize {
        MAX_CHUNKS.saturating_mul(self.chunk_size) - HEAD_BYTES
    }

    /// Allocates a memory object of at least `size` bytes.
    ///
    /// The chain is drawn all-or-nothing: if the pool runs out of blocks
    /// partway, every already-drawn chunk is returned and the pool's free
    /// count is exactly what it was before the call.
    ///
    /// The returned handle starts with a reference count of zero, meaning
    /// not yet reference-managed; either call [`MemObj::free`] when done,
    /// or move to [`MemObj::acquire`]/[`MemObj::release`] ownership.
    ///
    /// # Errors
    /// [`AllocError::OutOfBlocks`] when the pool cannot supply the whole
    /// chain; its `available` field is a post-rollback snapshot of the
    /// free count. [`AllocError::TooLarge`] when `size` needs more chunks
    /// than a chain can carry.
    pub fn alloc(&self, size: usize) -> Result<MemObj<'_>, AllocError> {
        let too_large = AllocError::TooLarge { requested: size, max_bytes: self.max_object_size() };
        let padded = size.checked_add(HEAD_BYTES).ok_or(too_large)?;
        let chunk_cnt = ceil_div(padded, self.chunk_size).max(1);
        if chunk_cnt > MAX_CHUNKS {
            return Err(too_large);
        }

        let mut builder = ChainBuilder::new(&self.blocks);
        for _ in 0..chunk_cnt {
            if !builder.grow() {
                // Dropping the builder returns every drawn chunk.
                drop(builder);
                return Err(AllocError::OutOfBlocks {
                    requested: size,
                    chunks: chunk_cnt,
                    available: self.blocks.free_blocks(),
                });
            }
        }
        let head = builder.commit();

        trace!(head, chunks = chunk_cnt, size, "allocated memory object");
        Ok(MemObj { pool: self, head })
    }
}

/// Transactional accumulator for a chunk chain under construction.
///
/// Blocks are drawn one at a time with [`ChainBuilder::grow`]. Dropping the
/// builder returns every drawn block to the pool, so a partially built
/// chain cannot leak on any path; [`ChainBuilder::commit`] links the chain,
/// writes the head metadata and defuses the rollback.
struct ChainBuilder<'a> {
    blocks: &'a BlockPool,
    chunks: BoundedVec<u16, MAX_CHUNKS>,
}

impl<'a> ChainBuilder<'a> {
    fn new(blocks: &'a BlockPool) -> Self {
        Self { blocks, chunks: BoundedVec::new() }
    }

    /// Draws one more block; `false` when the pool is exhausted.
    fn grow(&mut self) -> bool {
        match self.blocks.alloc_block() {
            Some(idx) => {
                // Cannot overflow: callers never grow past MAX_CHUNKS.
                let _ = self.chunks.push(idx);
                true
            }
            None => false,
        }
    }

    /// Links the drawn chunks into a chain and returns the head index.
    fn commit(self) -> u16 {
        debug_assert!(!self.chunks.is_empty());

        for pair in self.chunks.windows(2) {
            write_link(self.blocks, pair[0], Link::Continuation(pair[1]));
        }
        let last = *self.chunks.last().unwrap();
        write_link(self.blocks, last, Link::Terminal { pool_id: self.blocks.pool_id() });

        let head = self.chunks[0];
        unsafe {
            let meta = self.blocks.block_ptr(head);
            *meta.add(USER_CNT_OFFSET) = 0;
            *meta.add(CHUNK_CNT_OFFSET) = self.chunks.len() as u8;
        }

        core::mem::forget(self);
        head
    }
}

impl Drop for ChainBuilder<'_> {
    fn drop(&mut self) {
        for &idx in &self.chunks {
            self.blocks.free_block(idx);
        }
    }
}

/// Handle to one chunk-chain memory object.
///
/// The handle is a cheap, cloneable alias: clones refer to the same chain
/// and do not affect the reference count. Lifecycle is explicit — dropping
/// a handle does nothing; the chain is returned to its pool by
/// [`MemObj::free`] or by the [`MemObj::release`] that brings the count to
/// zero.
///
/// # Concurrency
/// `acquire`/`release` are safe under arbitrary concurrent use. The data
/// path is not internally locked: a `write` must not race another `write`
/// or a `read` of the same object, and neither may race a `free` (or the
/// final `release`). That ordering is the caller's responsibility; clones
/// of one handle share the chain, not a lock.
#[derive(Clone)]
pub struct MemObj<'pool> {
    pool: &'pool MemObjPool,
    head: u16,
}

impl<'pool> MemObj<'pool> {
    /// Number of chunks in the chain.
    pub fn chunk_count(&self) -> usize {
        read_chunk_cnt(&self.pool.blocks, self.head) as usize
    }

    /// Addressable payload bytes.
    ///
    /// The head metadata is carved out of the first chunk, so this is
    /// `chunk_count * chunk_size` minus the metadata bytes.
    pub fn capacity(&self) -> usize {
        self.chunk_count() * self.pool.chunk_size - HEAD_BYTES
    }

    /// Unconditionally tears the chain down, returning every chunk to the
    /// pool it came from.
    ///
    /// No reference-count check is performed; call this only when no other
    /// party holds the object. Reference-managed callers use
    /// [`MemObj::release`] instead.
    ///
    /// # Panics
    /// Panics if the chain's terminal link does not name this pool — the
    /// handle is foreign or the chain is corrupt.
    pub fn free(self) {
        let blocks = &self.pool.blocks;
        let chunk_cnt = self.chunk_count();

        // Walk to the last chunk and check the chain really ends there,
        // owned by this pool.
        let mut curr = self.head;
        for _ in 0..chunk_cnt - 1 {
            curr = match read_link(blocks, curr) {
                Link::Continuation(next) => next,
                Link::Terminal { .. } => panic!("memobj chain is shorter than its chunk count"),
            };
        }
        match read_link(blocks, curr) {
            Link::Terminal { pool_id } => assert_eq!(
                pool_id,
                blocks.pool_id(),
                "memobj freed into a pool it does not belong to"
            ),
            Link::Continuation(_) => panic!("memobj chain is longer than its chunk count"),
        }

        // Second pass: read each link before its block is poisoned/reused.
        let mut curr = self.head;
        for _ in 0..chunk_cnt {
            let next = read_link(blocks, curr);
            blocks.free_block(curr);
            if let Link::Continuation(idx) = next {
                curr = idx;
            }
        }

        trace!(head = self.head, chunks = chunk_cnt, "freed memory object");
    }

    /// Registers one more logical owner.
    ///
    /// A single atomic increment of the head chunk's reference count; safe
    /// to call concurrently with other `acquire`/`release` calls, including
    /// from contexts that preempt each other.
    ///
    /// # Panics
    /// Panics if the count would exceed 255 owners.
    pub fn acquire(&self) {
        let prev = user_cnt(&self.pool.blocks, self.head).fetch_add(1, Ordering::AcqRel);
        assert!(prev < u8::MAX, "memobj reference count overflow");
    }

    /// Drops one logical owner; the owner that brings the count to zero
    /// frees the chain.
    ///
    /// The decrement is a single atomic read-modify-write, so among
    /// concurrent releases exactly one observes the transition to zero and
    /// performs the free.
    ///
    /// # Panics
    /// Panics on underflow — more releases than acquires is a caller bug.
    pub fn release(self) {
        let prev = user_cnt(&self.pool.blocks, self.head).fetch_sub(1, Ordering::AcqRel);
        assert!(prev != 0, "memobj reference count underflow");
        if prev == 1 {
            self.free();
        }
    }

    /// Copies bytes out of the object starting at `offset`, returning how
    /// many were read.
    ///
    /// The transfer is clamped to the object's capacity: a buffer reaching
    /// past the end is filled only up to `capacity - offset` bytes, and the
    /// shorter count is returned. Short reads are defined behavior, not
    /// errors.
    ///
    /// # Panics
    /// Panics if `offset >= capacity`.
    pub fn read(&self, buf: &mut [u8], offset: usize) -> usize {
        let capacity = self.capacity();
        assert!(offset < capacity, "read offset {offset} out of range for capacity {capacity}");

        let len = buf.len().min(capacity - offset);
        let chunk_size = self.pool.chunk_size;
        let (mut block, mut chunk_off) = self.locate(offset);

        let mut done = 0;
        while done < len {
            let step = (chunk_size - chunk_off).min(len - done);
            unsafe {
                ptr::copy_nonoverlapping(
                    self.payload_ptr(block).add(chunk_off),
                    buf.as_mut_ptr().add(done),
                    step,
                );
            }
            done += step;
            chunk_off = 0;
            if done < len {
                block = self.next_of(block);
            }
        }
        len
    }

    /// Copies bytes into the object starting at `offset`, returning how
    /// many were written.
    ///
    /// Clamped exactly like [`MemObj::read`]. Writes touch payload bytes
    /// only; chain links and head metadata are outside the addressable
    /// range by construction.
    ///
    /// # Panics
    /// Panics if `offset >= capacity`.
    pub fn write(&self, data: &[u8], offset: usize) -> usize {
        let capacity = self.capacity();
        assert!(offset < capacity, "write offset {offset} out of range for capacity {capacity}");

        let len = data.len().min(capacity - offset);
        let chunk_size = self.pool.chunk_size;
        let (mut block, mut chunk_off) = self.locate(offset);

        let mut done = 0;
        while done < len {
            let step = (chunk_size - chunk_off).min(len - done);
            unsafe {
                ptr::copy_nonoverlapping(
                    data.as_ptr().add(done),
                    self.payload_ptr(block).add(chunk_off),
                    step,
                );
            }
            done += step;
            chunk_off = 0;
            if done < len {
                block = self.next_of(block);
            }
        }
        len
    }

    /// Translates a logical offset into the chunk holding it plus the
    /// offset within that chunk's payload.
    ///
    /// Logical offset 0 sits right after the head metadata, so the
    /// metadata bytes shift the whole address space without being
    /// addressable themselves.
    fn locate(&self, offset: usize) -> (u16, usize) {
        let pos = offset + HEAD_BYTES;
        let chunk_idx = pos / self.pool.chunk_size;
        let chunk_off = pos % self.pool.chunk_size;

        let mut block = self.head;
        for _ in 0..chunk_idx {
            block = self.next_of(block);
        }
        (block, chunk_off)
    }

    /// First payload byte of a chunk, past its link word.
    fn payload_ptr(&self, block: u16) -> *mut u8 {
        unsafe { self.pool.blocks.block_ptr(block).add(LINK_BYTES) }
    }

    fn next_of(&self, block: u16) -> u16 {
        match read_link(&self.pool.blocks, block) {
            Link::Continuation(next) => next,
            Link::Terminal { .. } => panic!("walked past the end of a memobj chain"),
        }
    }
}

impl core::fmt::Debug for MemObj<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemObj")
            .field("head", &self.head)
            .field("chunks", &self.chunk_count())
            .field("capacity", &self.capacity())
            .finish()
    }
}
