//! In-place chunk headers.
//!
//! ```text
//!   Free chunk                         Allocated chunk
//!   ┌──────────┬──────────┬──────┐     ┌────────┬─────┬──────────────────┐
//!   │ size     │ next     │ ...  │     │ size   │ pad │ payload ...      │
//!   │ (usize)  │ (*mut)   │      │     │ (u32)  │     │                  │
//!   └──────────┴──────────┴──────┘     └────────┴─────┴──────────────────┘
//!                                                     ▲
//!                                                     └── returned address
//! ```
//!
//! Both headers start at the chunk's first byte and record the size of the
//! whole chunk, header included.

use core::mem;

use crate::{
  align,
  align::checked_align,
  error::{AllocError, Result},
};

#[repr(C)]
pub(crate) struct FreeChunk {
  pub size: usize,
  pub next: *mut FreeChunk,
}

#[repr(C)]
struct AllocHeader {
  size: u32,
  _pad: u32,
}

/// Bytes between an allocated chunk's start and the address handed out.
pub const ALLOC_HEADER_SIZE: usize = mem::size_of::<AllocHeader>();

/// Smallest chunk able to hold a free-list node.
pub const MIN_FREE_CHUNK: usize = align!(mem::size_of::<FreeChunk>());

/// Largest chunk a single request may need. Leaves room for a chunk consumed
/// whole (at most `MIN_FREE_CHUNK` bytes bigger) to still fit the u32 tag.
pub const MAX_CHUNK: usize = (u32::MAX as usize - MIN_FREE_CHUNK) & !(crate::align::ALIGNMENT - 1);

const _: () = assert!(ALLOC_HEADER_SIZE == 8);
const _: () = assert!(mem::align_of::<FreeChunk>() <= crate::align::ALIGNMENT);

/// Total footprint of the chunk serving a request for `n` payload bytes.
pub fn chunk_size(n: usize) -> Result<usize> {
  if n == 0 {
    return Err(AllocError::InvalidSize);
  }

  let size = n
    .checked_add(ALLOC_HEADER_SIZE)
    .and_then(checked_align)
    .ok_or(AllocError::TooLarge { size: n })?;

  if size > MAX_CHUNK {
    return Err(AllocError::TooLarge { size: n });
  }

  Ok(size)
}

/// Writes a free-list node at `at`.
///
/// # Safety
///
/// `at` must be 8-aligned and valid for writes of `size` bytes, with
/// `size >= MIN_FREE_CHUNK`.
pub(crate) unsafe fn write_free(
  at: *mut u8,
  size: usize,
  next: *mut FreeChunk,
) -> *mut FreeChunk {
  debug_assert!(size >= MIN_FREE_CHUNK && size % crate::align::ALIGNMENT == 0);

  let chunk = at.cast::<FreeChunk>();
  unsafe { chunk.write(FreeChunk { size, next }) };
  chunk
}

/// Tags the chunk at `at` as allocated and returns the payload address.
///
/// # Safety
///
/// `at` must be 8-aligned and valid for writes of `size` bytes, and `size`
/// must have come from [`chunk_size`] or a free chunk at least that large.
pub(crate) unsafe fn write_allocated(
  at: *mut u8,
  size: usize,
) -> *mut u8 {
  debug_assert!(size <= u32::MAX as usize);

  unsafe {
    at.cast::<AllocHeader>().write(AllocHeader {
      size: size as u32,
      _pad: 0,
    });
    at.add(ALLOC_HEADER_SIZE)
  }
}

/// Turns an allocated chunk back into a free-list node, rebuilding the
/// full-width size from the allocated tag.
///
/// # Safety
///
/// `payload` must be an address returned by [`write_allocated`] whose chunk is
/// not already free.
pub(crate) unsafe fn free_from_payload(
  payload: *mut u8,
  next: *mut FreeChunk,
) -> *mut FreeChunk {
  unsafe {
    let start = payload.sub(ALLOC_HEADER_SIZE);
    let size = start.cast::<AllocHeader>().read().size as usize;
    write_free(start, size, next)
  }
}

/// Address one past the last byte of a free chunk.
///
/// # Safety
///
/// `chunk` must point to a live free-list node.
pub(crate) unsafe fn end_of(chunk: *mut FreeChunk) -> usize {
  chunk as usize + unsafe { (*chunk).size }
}
