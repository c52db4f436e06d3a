use core::{
  alloc::{GlobalAlloc, Layout},
  ptr,
};

use spin::{Mutex, MutexGuard};

use crate::{align::ALIGNMENT, free_list::FreeListAllocator, growth::HeapGrowth};

/// A [`FreeListAllocator`] behind a spin lock, usable as the process-wide
/// allocator.
///
/// ```rust,ignore
/// use freelist_alloc::{LockedFreeList, Sbrk};
///
/// #[global_allocator]
/// static HEAP: LockedFreeList<Sbrk> = LockedFreeList::new(Sbrk::new());
/// ```
///
/// Layouts aligned to more than 8 bytes are refused with a null pointer.
/// When installed globally, any `log` backend in use must not allocate.
pub struct LockedFreeList<G: HeapGrowth> {
  inner: Mutex<FreeListAllocator<G>>,
}

impl<G: HeapGrowth> LockedFreeList<G> {
  pub const fn new(grower: G) -> Self {
    Self {
      inner: Mutex::new(FreeListAllocator::new(grower)),
    }
  }

  pub const fn from_allocator(allocator: FreeListAllocator<G>) -> Self {
    Self {
      inner: Mutex::new(allocator),
    }
  }

  /// Exclusive access to the wrapped allocator.
  pub fn lock(&self) -> MutexGuard<'_, FreeListAllocator<G>> {
    self.inner.lock()
  }

  pub fn coalesce(&self) {
    self.inner.lock().coalesce();
  }
}

unsafe impl<G: HeapGrowth + Send> GlobalAlloc for LockedFreeList<G> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.inner.lock().allocate(layout.size())
  }

  unsafe fn dealloc(
    &self,
    address: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.inner.lock().deallocate(address) }
  }
}
