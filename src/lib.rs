//! # freelist-alloc - A First-Fit Free-List Allocator
//!
//! This crate provides a small **free-list allocator** that carves chunks out of
//! a heap it grows on demand, by default with the `sbrk` system call.
//!
//! ## Overview
//!
//! Free memory is kept in a singly linked list whose nodes live inside the free
//! chunks themselves:
//!
//! ```text
//!   Free List:
//!
//!   head
//!    │
//!    ▼
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐
//!   │ size: 32 │ ───▶ │ size: 16 │ ───▶ │ size: 96 │ ───▶ ∅
//!   └──────────┘      └──────────┘      └──────────┘
//!
//!   Requests walk the list from the head and take the first chunk that fits.
//!   When none does, the heap grows by max(8192, chunk size) bytes and the new
//!   region joins the list as its tail.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   freelist_alloc
//!   ├── align      - Alignment macro (align!) and the 8-byte granule
//!   ├── chunk      - In-place free and allocated chunk headers
//!   ├── config     - HeapConfig (growth unit)
//!   ├── error      - AllocError, ConfigError
//!   ├── growth     - HeapGrowth trait, Sbrk and ArenaHeap
//!   ├── free_list  - FreeListAllocator: allocate, deallocate, inspection
//!   ├── coalesce   - Merging of address-adjacent free chunks
//!   └── locked     - LockedFreeList, a GlobalAlloc behind a spin lock
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use freelist_alloc::{ArenaHeap, FreeListAllocator};
//!
//! let mut allocator = FreeListAllocator::new(ArenaHeap::with_capacity(64 * 1024));
//!
//! let address = allocator.allocate(24) as *mut u64;
//! assert!(!address.is_null());
//!
//! unsafe {
//!     *address = 42;
//!     allocator.deallocate(address as *mut u8);
//! }
//!
//! allocator.coalesce();
//! assert_eq!(allocator.free_chunk_count(), 1);
//! ```
//!
//! ## How It Works
//!
//! Every request is rounded up, header included, to a multiple of 8 bytes. A
//! fitting chunk either gives up its tail or, when what would remain is too
//! small to hold a free-list node, is handed out whole:
//!
//! ```text
//!   Split (chunk keeps its place in the list, only shrinks):
//!
//!   ┌─────────────────────────────┬──────────────────┐
//!   │ free: size - n              │ allocated: n     │
//!   └─────────────────────────────┴──────────────────┘
//!                                  ▲
//!                                  └── header (8 bytes), then the payload
//!
//!   Consume whole (chunk leaves the list):
//!
//!   ┌────────────────────────────────────────────────┐
//!   │ allocated: size                                │
//!   └────────────────────────────────────────────────┘
//! ```
//!
//! Freed chunks are pushed on the head of the list in constant time. Nothing is
//! merged on free; [`FreeListAllocator::coalesce`] sorts the list by address and
//! fuses neighbours when asked to:
//!
//! ```text
//!   before:  [0x40+32] ─▶ [0x00+32] ─▶ [0x20+32] ─▶ [0x80+16]
//!   after:   [0x00+96] ─▶ [0x80+16]
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded**: [`FreeListAllocator`] has no internal locking; use
//!   [`LockedFreeList`] or an external lock
//! - **Grow only**: memory is never handed back to the operating system
//! - **Trusting**: double frees and foreign pointers are not detected
//! - **8-byte alignment**: larger alignments are not supported
//! - **Unix-only** for [`Sbrk`]; [`ArenaHeap`] works anywhere
//!
//! ## Safety
//!
//! Allocation is safe to call; the returned memory is raw. Deallocation is
//! `unsafe` because the allocator cannot tell whether a pointer is its own.

pub mod align;
mod chunk;
mod coalesce;
mod config;
mod error;
mod free_list;
mod growth;
mod locked;

pub use chunk::{ALLOC_HEADER_SIZE, MAX_CHUNK, MIN_FREE_CHUNK, chunk_size};
pub use config::{DEFAULT_GROWTH_UNIT, HeapConfig};
pub use error::{AllocError, ConfigError, Result};
pub use free_list::{FreeChunks, FreeListAllocator, FreeNode};
pub use growth::{ArenaHeap, HeapGrowth, Sbrk};
pub use locked::LockedFreeList;
