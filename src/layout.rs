//! On-arena chunk layout
//!
//! Every block starts with a two-byte little-endian link word. A chunk in
//! the middle of a chain stores the index of the next chunk there; the last
//! chunk stores a terminal marker carrying the identity of the pool the
//! chain was drawn from. The head chunk's payload then begins with two
//! metadata bytes: the atomic reference count and the chunk count. Payload
//! bytes follow.
//!
//! ```text
//! head chunk:          [link][user_cnt][chunk_cnt][payload...]
//! continuation chunk:  [link][payload.......................]
//! ```

/// Bytes reserved at the start of every block for the link word.
pub(crate) const LINK_BYTES: usize = 2;

/// Bytes of head metadata carved out of the first chunk's payload.
pub(crate) const HEAD_BYTES: usize = 2;

/// Byte offset of the reference count within the head chunk.
pub(crate) const USER_CNT_OFFSET: usize = LINK_BYTES;

/// Byte offset of the chunk count within the head chunk.
pub(crate) const CHUNK_CNT_OFFSET: usize = LINK_BYTES + 1;

/// Longest chain a single object may span; the chunk count is one byte.
pub(crate) const MAX_CHUNKS: usize = u8::MAX as usize;

/// High bit of the link word distinguishes terminal links from chunk
/// indices, so indices (and pool ids) are limited to 15 bits.
const TERMINAL_BIT: u16 = 0x8000;

/// Largest number of blocks a pool may hold.
pub(crate) const MAX_BLOCKS: usize = TERMINAL_BIT as usize;

/// Mask applied to pool ids before they are stored in a terminal link.
pub(crate) const POOL_ID_MASK: u16 = TERMINAL_BIT - 1;

/// Decoded form of a chunk's link word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    /// This chunk is followed by the chunk at the given block index.
    Continuation(u16),
    /// This chunk ends the chain; the chain belongs to the given pool.
    Terminal {
        /// Identity of the owning pool, 15 bits.
        pool_id: u16,
    },
}

impl Link {
    pub(crate) fn encode(self) -> u16 {
        match self {
            Link::Continuation(next) => {
                debug_assert!(next < TERMINAL_BIT);
                next
            }
            Link::Terminal { pool_id } => TERMINAL_BIT | (pool_id & POOL_ID_MASK),
        }
    }

    pub(crate) fn decode(raw: u16) -> Self {
        if raw & TERMINAL_BIT != 0 {
            Link::Terminal { pool_id: raw & POOL_ID_MASK }
        } else {
            Link::Continuation(raw)
        }
    }
}
