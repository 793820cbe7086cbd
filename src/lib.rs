//! Dynamically-sized memory objects built from fixed-size pool blocks
//!
//! This crate provides variable-length buffers for environments where a
//! general-purpose heap is unwelcome: every buffer is a chain of
//! equal-size chunks drawn from a pre-allocated [`BlockPool`], so
//! allocation latency is bounded and the arena cannot fragment.
//!
//! - [`BlockPool`] — fixed-block allocator over one owned arena, with an
//!   index free-list, O(1) alloc/free and utilization statistics.
//! - [`MemObjPool`] — binds a block pool to the memory-object layer and
//!   hands out chunk chains all-or-nothing.
//! - [`MemObj`] — a handle to one chain: linear reads and writes at
//!   arbitrary byte offsets across the physically disjoint chunks, plus an
//!   interrupt-safe atomic reference count for shared ownership.
//!
//! # Example
//!
//! ```
//! use memobj::MemObjPool;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 16 blocks of 32 bytes; each chunk carries 30 payload bytes.
//!     let pool = MemObjPool::new(32, 16)?;
//!
//!     let obj = pool.alloc(100)?;
//!     assert!(obj.capacity() >= 100);
//!
//!     obj.write(b"hello", 95);
//!     let mut out = [0u8; 5];
//!     obj.read(&mut out, 95);
//!     assert_eq!(&out, b"hello");
//!
//!     obj.free();
//!     assert_eq!(pool.free_blocks(), 16);
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency
//!
//! [`MemObj::acquire`] and [`MemObj::release`] are safe under arbitrary
//! concurrent invocation. Allocation and free on distinct objects of one
//! pool are safe from any context; the pool serializes its own free list.
//! The data path of one object is not locked: concurrent writes, a write
//! overlapping a read, or either racing the object's teardown all require
//! external ordering by the caller. No operation blocks or sleeps.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
mod layout;
pub mod memobj;
pub mod pool;
pub mod utils;

pub use error::{AllocError, PoolInitError};
pub use memobj::{MemObj, MemObjPool};
pub use pool::{BlockPool, BlockPoolConfig, BlockPoolStats, MIN_BLOCK_SIZE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
