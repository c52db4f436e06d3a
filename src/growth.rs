//! Heap growth capabilities.
//!
//! The allocator never returns memory: it only ever asks for more contiguous
//! address space, one region at a time.

use core::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};
use log::debug;

use crate::align::ALIGNMENT;

/// Source of fresh heap regions.
///
/// # Safety
///
/// A region returned by [`grow`](HeapGrowth::grow) must be 8-aligned, valid
/// for reads and writes of `bytes` bytes, disjoint from every other region
/// handed out, and stay valid for as long as the implementor is alive.
/// Consecutive successful calls should yield adjacent regions.
pub unsafe trait HeapGrowth {
  /// Extends the heap by `bytes` bytes and returns the start of the new
  /// region, or `None` once no more address space is available.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;

  /// Current end of the heap managed by this capability.
  fn boundary(&self) -> usize;
}

/// Grows the program break with `sbrk(2)`.
///
/// Only one `Sbrk` should be in use per process, and nothing else in the
/// process should move the break, or regions stop being adjacent.
#[derive(Debug, Default)]
pub struct Sbrk {
  _private: (),
}

impl Sbrk {
  pub const fn new() -> Self {
    Self { _private: () }
  }

  unsafe fn extend(bytes: usize) -> Option<*mut u8> {
    let increment = intptr_t::try_from(bytes).ok()?;
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    Some(address.cast())
  }
}

unsafe impl HeapGrowth for Sbrk {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    unsafe {
      let current = sbrk(0) as usize;
      let padding = current.wrapping_neg() & (ALIGNMENT - 1);

      if padding != 0 {
        debug!("aligning program break {:#x} by {} bytes", current, padding);
        Self::extend(padding)?;
      }

      NonNull::new(Self::extend(bytes)?)
    }
  }

  fn boundary(&self) -> usize {
    unsafe { sbrk(0) as usize }
  }
}

/// A fixed-capacity heap carved out of one owned buffer.
///
/// Regions are handed out back to back from the start of the buffer, so two
/// successful calls to `grow` always yield adjacent regions. Useful for tests
/// and for environments without `sbrk`.
pub struct ArenaHeap {
  storage: Box<[u64]>,
  used: usize,
}

impl ArenaHeap {
  /// Creates an arena able to hand out `capacity` bytes in total (rounded
  /// down to a multiple of 8).
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      storage: vec![0u64; capacity / ALIGNMENT].into_boxed_slice(),
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.storage.len() * ALIGNMENT
  }

  /// Bytes already handed out.
  pub fn used(&self) -> usize {
    self.used
  }

  /// First address of the arena.
  pub fn base(&self) -> usize {
    self.storage.as_ptr() as usize
  }
}

unsafe impl HeapGrowth for ArenaHeap {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let end = self.used.checked_add(bytes)?;
    if end > self.capacity() || bytes % ALIGNMENT != 0 {
      return None;
    }

    let start = unsafe { self.storage.as_mut_ptr().cast::<u8>().add(self.used) };
    self.used = end;

    NonNull::new(start)
  }

  fn boundary(&self) -> usize {
    self.base() + self.used
  }
}

impl core::fmt::Debug for ArenaHeap {
  fn fmt(
    &self,
    f: &mut core::fmt::Formatter<'_>,
  ) -> core::fmt::Result {
    f.debug_struct("ArenaHeap")
      .field("base", &format_args!("{:#x}", self.base()))
      .field("used", &self.used)
      .field("capacity", &self.capacity())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_regions_are_adjacent() {
    let mut arena = ArenaHeap::with_capacity(64);

    let first = arena.grow(16).unwrap();
    let second = arena.grow(32).unwrap();

    assert_eq!(first.as_ptr() as usize, arena.base());
    assert_eq!(second.as_ptr() as usize, first.as_ptr() as usize + 16);
    assert_eq!(first.as_ptr() as usize % ALIGNMENT, 0);
    assert_eq!(arena.boundary(), arena.base() + 48);
  }

  #[test]
  fn test_arena_exhaustion_reports_none() {
    let mut arena = ArenaHeap::with_capacity(32);

    assert!(arena.grow(24).is_some());
    assert!(arena.grow(16).is_none());
    assert_eq!(arena.used(), 24);
    assert!(arena.grow(8).is_some());
    assert!(arena.grow(8).is_none());
  }

  #[test]
  fn test_sbrk_moves_break_forward() {
    let mut heap = Sbrk::new();

    let region = heap.grow(64).unwrap();
    let after = heap.boundary();

    assert_eq!(region.as_ptr() as usize % ALIGNMENT, 0);
    assert!(after >= region.as_ptr() as usize + 64);

    unsafe { region.as_ptr().write_bytes(0xAB, 64) };
  }
}
