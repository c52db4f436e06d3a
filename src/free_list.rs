use core::{fmt, marker::PhantomData, ptr, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
  chunk::{FreeChunk, MIN_FREE_CHUNK, chunk_size, free_from_payload, write_allocated, write_free},
  config::HeapConfig,
  error::{AllocError, Result},
  growth::HeapGrowth,
};

/// Outcome of a first-fit walk over the free list.
enum Search {
  Fit {
    prev: *mut FreeChunk,
    chunk: *mut FreeChunk,
  },
  Miss {
    tail: *mut FreeChunk,
  },
}

/// First-fit free-list allocator on top of a [`HeapGrowth`] capability.
///
/// Not thread-safe: wrap it in [`LockedFreeList`](crate::LockedFreeList) or
/// another lock when more than one thread can reach it.
pub struct FreeListAllocator<G: HeapGrowth> {
  pub(crate) head: *mut FreeChunk,
  grower: G,
  config: HeapConfig,
  growth_count: usize,
  footprint: usize,
}

// The free list is only reachable through the allocator, so moving the
// allocator moves exclusive ownership of every free chunk with it.
unsafe impl<G: HeapGrowth + Send> Send for FreeListAllocator<G> {}

impl<G: HeapGrowth> FreeListAllocator<G> {
  pub const fn new(grower: G) -> Self {
    Self::with_config(grower, HeapConfig::DEFAULT)
  }

  pub const fn with_config(
    grower: G,
    config: HeapConfig,
  ) -> Self {
    Self {
      head: ptr::null_mut(),
      grower,
      config,
      growth_count: 0,
      footprint: 0,
    }
  }

  pub fn config(&self) -> HeapConfig {
    self.config
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  /// Number of successful heap growth events so far.
  pub fn growth_count(&self) -> usize {
    self.growth_count
  }

  /// Total bytes obtained from the growth capability.
  pub fn footprint(&self) -> usize {
    self.footprint
  }

  /// Current end of the heap as reported by the growth capability.
  pub fn heap_boundary(&self) -> usize {
    self.grower.boundary()
  }

  /// Sum of the sizes of every free chunk.
  pub fn free_bytes(&self) -> usize {
    self.free_chunks().map(|node| node.size()).sum()
  }

  pub fn free_chunk_count(&self) -> usize {
    self.free_chunks().count()
  }

  /// Forgets every free chunk.
  ///
  /// Memory already obtained from the growth capability is not given back;
  /// the footprint keeps counting it. Outstanding allocations stay valid but
  /// must not be deallocated into this allocator afterwards.
  pub fn reset(&mut self) {
    debug!("resetting free list ({} bytes abandoned)", self.free_bytes());
    self.head = ptr::null_mut();
  }

  /// Allocates a chunk with room for `size` payload bytes and returns the
  /// 8-aligned payload address, or null on failure.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    match self.try_allocate(size) {
      Ok(address) => address.as_ptr(),
      Err(_) => ptr::null_mut(),
    }
  }

  /// Like [`allocate`](Self::allocate) but says why a request failed. The free
  /// list is left untouched on every error.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let needed = chunk_size(size)?;

    unsafe {
      let (prev, chunk) = match self.find_fit(needed) {
        Search::Fit { prev, chunk } => (prev, chunk),
        Search::Miss { tail } => (tail, self.grow_after(tail, needed)?),
      };

      Ok(self.carve(prev, chunk, needed))
    }
  }

  /// Returns the chunk behind `address` to the head of the free list.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer returned by this allocator's
  /// [`allocate`](Self::allocate) that has not been deallocated since. Neither
  /// condition is checked.
  pub unsafe fn deallocate(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    unsafe {
      self.head = free_from_payload(address, self.head);
      trace!("freed {} bytes at {:p}", (*self.head).size, self.head);
    }
  }

  /// Head of the free list, for inspection.
  pub fn list_begin(&self) -> Option<FreeNode<'_>> {
    FreeNode::from_raw(self.head)
  }

  /// Successor of `node` in the free list. The empty handle has no successor.
  pub fn list_next<'a>(
    &'a self,
    node: Option<FreeNode<'a>>,
  ) -> Option<FreeNode<'a>> {
    node.and_then(|node| FreeNode::from_raw(unsafe { (*node.chunk.as_ptr()).next }))
  }

  /// Walks the free list in link order.
  pub fn free_chunks(&self) -> FreeChunks<'_, G> {
    FreeChunks {
      allocator: self,
      next: self.list_begin(),
    }
  }

  unsafe fn find_fit(
    &self,
    size: usize,
  ) -> Search {
    unsafe {
      let mut prev: *mut FreeChunk = ptr::null_mut();
      let mut current: *mut FreeChunk = self.head;

      while !current.is_null() {
        if (*current).size >= size {
          return Search::Fit {
            prev,
            chunk: current,
          };
        }
        prev = current;
        current = (*current).next;
      }

      Search::Miss { tail: prev }
    }
  }

  /// Grows the heap enough for a `size`-byte chunk and links the new region
  /// after `tail` (or as the head when the list is empty).
  unsafe fn grow_after(
    &mut self,
    tail: *mut FreeChunk,
    size: usize,
  ) -> Result<*mut FreeChunk> {
    let bytes = self.config.growth_for(size);

    let Some(region) = self.grower.grow(bytes) else {
      warn!("heap growth of {} bytes failed", bytes);
      return Err(AllocError::OutOfMemory { requested: bytes });
    };

    self.growth_count += 1;
    self.footprint += bytes;
    debug!(
      "grew heap by {} bytes at {:p}, boundary = {:#x}",
      bytes,
      region,
      self.grower.boundary()
    );

    unsafe {
      let chunk = write_free(region.as_ptr(), bytes, ptr::null_mut());

      if tail.is_null() {
        self.head = chunk;
      } else {
        (*tail).next = chunk;
      }

      Ok(chunk)
    }
  }

  /// Hands out `size` bytes of `chunk`, slicing them off its end when the
  /// rest can still stand as a free chunk, or taking the whole chunk
  /// otherwise.
  unsafe fn carve(
    &mut self,
    prev: *mut FreeChunk,
    chunk: *mut FreeChunk,
    size: usize,
  ) -> NonNull<u8> {
    unsafe {
      let available = (*chunk).size;

      let payload = if available >= size.saturating_add(MIN_FREE_CHUNK) {
        let remainder = available - size;
        (*chunk).size = remainder;
        trace!("split {:p}: {} -> {} + {}", chunk, available, remainder, size);

        write_allocated(chunk.cast::<u8>().add(remainder), size)
      } else {
        let next = (*chunk).next;

        if prev.is_null() {
          self.head = next;
        } else {
          (*prev).next = next;
        }
        trace!("consumed {:p} whole: {} bytes for a {} byte chunk", chunk, available, size);

        write_allocated(chunk.cast::<u8>(), available)
      };

      NonNull::new_unchecked(payload)
    }
  }
}

impl<G: HeapGrowth + Default> Default for FreeListAllocator<G> {
  fn default() -> Self {
    Self::new(G::default())
  }
}

impl<G: HeapGrowth> fmt::Debug for FreeListAllocator<G> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("FreeListAllocator")
      .field("config", &self.config)
      .field("growth_count", &self.growth_count)
      .field("footprint", &self.footprint)
      .field("free", &ListView(self))
      .finish()
  }
}

/// Read-only handle to a free chunk.
///
/// Borrows the allocator, so the list cannot change while a handle is alive.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FreeNode<'a> {
  chunk: NonNull<FreeChunk>,
  _list: PhantomData<&'a FreeChunk>,
}

impl FreeNode<'_> {
  fn from_raw(chunk: *mut FreeChunk) -> Option<Self> {
    NonNull::new(chunk).map(|chunk| Self {
      chunk,
      _list: PhantomData,
    })
  }

  /// Start address of the chunk.
  pub fn address(&self) -> usize {
    self.chunk.as_ptr() as usize
  }

  /// Total size of the chunk, header included.
  pub fn size(&self) -> usize {
    unsafe { (*self.chunk.as_ptr()).size }
  }
}

impl fmt::Debug for FreeNode<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#x}+{}", self.address(), self.size())
  }
}

/// Iterator over the free list, see [`FreeListAllocator::free_chunks`].
pub struct FreeChunks<'a, G: HeapGrowth> {
  allocator: &'a FreeListAllocator<G>,
  next: Option<FreeNode<'a>>,
}

impl<'a, G: HeapGrowth> Iterator for FreeChunks<'a, G> {
  type Item = FreeNode<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.next?;
    self.next = self.allocator.list_next(Some(current));
    Some(current)
  }
}

struct ListView<'a, G: HeapGrowth>(&'a FreeListAllocator<G>);

impl<G: HeapGrowth> fmt::Debug for ListView<'_, G> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_list().entries(self.0.free_chunks()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{align::ALIGNMENT, chunk::ALLOC_HEADER_SIZE, growth::ArenaHeap};

  fn arena_allocator(capacity: usize) -> FreeListAllocator<ArenaHeap> {
    let _ = env_logger::builder().is_test(true).try_init();
    FreeListAllocator::new(ArenaHeap::with_capacity(capacity))
  }

  fn sizes(allocator: &FreeListAllocator<ArenaHeap>) -> Vec<usize> {
    allocator.free_chunks().map(|node| node.size()).collect()
  }

  #[test]
  fn test_first_allocation_grows_once() {
    let mut allocator = arena_allocator(64 * 1024);
    let base = allocator.grower().base();

    let address = allocator.allocate(1);

    assert!(!address.is_null());
    assert_eq!(address as usize % ALIGNMENT, 0);
    assert_eq!(allocator.growth_count(), 1);
    assert_eq!(allocator.footprint(), 8192);
    assert_eq!(sizes(&allocator), vec![8192 - 16]);

    // Sliced from the end of the grown region.
    assert_eq!(address as usize, base + 8192 - 16 + ALLOC_HEADER_SIZE);
  }

  #[test]
  fn test_large_request_grows_by_its_own_size() {
    let mut allocator = arena_allocator(64 * 1024);
    let base = allocator.grower().base();

    allocator.allocate(1);
    let big = allocator.allocate(8192);

    assert!(!big.is_null());
    assert_eq!(allocator.growth_count(), 2);
    assert_eq!(allocator.footprint(), 8192 + 8200);
    assert_eq!(big as usize, base + 8192 + ALLOC_HEADER_SIZE);
    assert_eq!(sizes(&allocator), vec![8192 - 16]);

    unsafe {
      big.write_bytes(0x5A, 8192);
    }
  }

  #[test]
  fn test_zero_size_is_rejected() {
    let mut allocator = arena_allocator(64 * 1024);

    assert!(allocator.allocate(0).is_null());
    assert_eq!(allocator.try_allocate(0), Err(AllocError::InvalidSize));
    assert_eq!(allocator.growth_count(), 0);
    assert!(allocator.list_begin().is_none());

    allocator.allocate(32);
    let before = sizes(&allocator);
    assert!(allocator.allocate(0).is_null());
    assert_eq!(sizes(&allocator), before);
  }

  #[test]
  fn test_first_fit_consumes_whole_chunk() {
    let config = HeapConfig::new(16 + 32 + 64).unwrap();
    let mut allocator = FreeListAllocator::with_config(ArenaHeap::with_capacity(4096), config);
    let base = allocator.grower().base();

    unsafe {
      let small = allocator.allocate(8);
      let medium = allocator.allocate(24);
      let large = allocator.allocate(56);
      assert!(allocator.list_begin().is_none());

      allocator.deallocate(large);
      allocator.deallocate(medium);
      allocator.deallocate(small);
      assert_eq!(sizes(&allocator), vec![16, 32, 64]);

      // 48 bytes round to a 56 byte chunk; 64 - 56 is too small to stay free.
      let address = allocator.allocate(48);

      assert_eq!(address, large);
      assert_eq!(address as usize, base + ALLOC_HEADER_SIZE);
      assert_eq!(sizes(&allocator), vec![16, 32]);
      assert_eq!(allocator.growth_count(), 1);

      // The whole 64 bytes come back on free.
      allocator.deallocate(address);
      assert_eq!(sizes(&allocator), vec![64, 16, 32]);
    }
  }

  #[test]
  fn test_lifo_reuse() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let first = allocator.allocate(100);
      let second = allocator.allocate(100);

      allocator.deallocate(first);
      let third = allocator.allocate(64);

      let start = first as usize - ALLOC_HEADER_SIZE;
      let end = start + 112;
      assert!((start..end).contains(&(third as usize)));
      assert_ne!(third, second);
    }
  }

  #[test]
  fn test_allocations_do_not_overlap() {
    let mut allocator = arena_allocator(64 * 1024);

    unsafe {
      let first = allocator.allocate(8) as *mut u64;
      *first = 3;

      let count: usize = 6;
      let second = allocator.allocate(count * 2) as *mut u16;
      for i in 0..count {
        *(second.add(i)) = (i + 1) as u16;
      }

      assert_eq!(*first, 3);
      for i in 0..count {
        assert_eq!((i + 1) as u16, *(second.add(i)));
      }
    }
  }

  #[test]
  fn test_out_of_memory_leaves_list_untouched() {
    let mut allocator = arena_allocator(8192);

    assert!(!allocator.allocate(1).is_null());
    let before = sizes(&allocator);

    assert_eq!(
      allocator.try_allocate(9000),
      Err(AllocError::OutOfMemory { requested: 9008 })
    );
    assert!(allocator.allocate(9000).is_null());
    assert_eq!(sizes(&allocator), before);
    assert_eq!(allocator.growth_count(), 1);
  }

  #[test]
  fn test_out_of_memory_on_first_growth() {
    let mut allocator = arena_allocator(100);

    assert_eq!(
      allocator.try_allocate(1),
      Err(AllocError::OutOfMemory { requested: 8192 })
    );
    assert!(allocator.list_begin().is_none());
  }

  #[test]
  fn test_deallocate_null_is_noop() {
    let mut allocator = arena_allocator(64 * 1024);
    allocator.allocate(10);
    let before = sizes(&allocator);

    unsafe { allocator.deallocate(ptr::null_mut()) };

    assert_eq!(sizes(&allocator), before);
  }

  #[test]
  fn test_list_traversal() {
    let mut allocator = arena_allocator(64 * 1024);
    assert_eq!(allocator.list_next(None), None);

    unsafe {
      let a = allocator.allocate(8);
      let b = allocator.allocate(24);
      allocator.deallocate(a);
      allocator.deallocate(b);
    }

    let first = allocator.list_begin();
    let second = allocator.list_next(first);
    let third = allocator.list_next(second);

    assert_eq!(first.map(|node| node.size()), Some(32));
    assert_eq!(second.map(|node| node.size()), Some(16));
    assert_eq!(third.map(|node| node.size()), Some(8192 - 48));
    assert_eq!(allocator.list_next(third), None);
    assert_eq!(allocator.free_chunk_count(), 3);
    assert_eq!(allocator.free_bytes(), 8192);
  }

  #[test]
  fn test_reset_forgets_free_chunks() {
    let mut allocator = arena_allocator(64 * 1024);
    allocator.allocate(10);

    allocator.reset();

    assert!(allocator.list_begin().is_none());
    assert_eq!(allocator.footprint(), 8192);
    assert!(!allocator.allocate(10).is_null());
    assert_eq!(allocator.growth_count(), 2);
  }

  #[test]
  fn test_debug_lists_free_chunks() {
    let mut allocator = arena_allocator(64 * 1024);
    allocator.allocate(1);

    let rendered = format!("{:?}", allocator);

    assert!(rendered.contains("growth_count: 1"));
    assert!(rendered.contains("+8176"));
  }
}
