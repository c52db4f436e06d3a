//! Merging of address-adjacent free chunks.
//!
//! The list is first relinked in ascending address order, then walked once,
//! each chunk absorbing every successor that starts exactly where it ends.
//! Sorting happens on the list nodes themselves so coalescing never needs to
//! allocate.

use core::ptr;

use log::{debug, trace};

use crate::{
  chunk::{FreeChunk, end_of},
  free_list::FreeListAllocator,
  growth::HeapGrowth,
};

impl<G: HeapGrowth> FreeListAllocator<G> {
  /// Sorts the free list by address and merges every run of physically
  /// adjacent free chunks into one chunk. Allocated chunks and the heap
  /// boundary are never touched.
  pub fn coalesce(&mut self) {
    if self.head.is_null() {
      return;
    }

    let mut merged = 0usize;

    unsafe {
      self.head = sort_by_address(self.head);

      let mut current = self.head;
      while !current.is_null() {
        let mut next = (*current).next;

        while !next.is_null() && end_of(current) == next as usize {
          trace!("merging {:p}+{} into {:p}", next, (*next).size, current);
          (*current).size += (*next).size;
          next = (*next).next;
          (*current).next = next;
          merged += 1;
        }

        current = next;
      }
    }

    debug!("coalesce absorbed {} free chunks", merged);
  }
}

/// Merge sort over the chain starting at `head`; returns the new head.
unsafe fn sort_by_address(head: *mut FreeChunk) -> *mut FreeChunk {
  unsafe {
    if head.is_null() || (*head).next.is_null() {
      return head;
    }

    let back = split_half(head);
    merge(sort_by_address(head), sort_by_address(back))
  }
}

/// Cuts the chain after its middle node and returns the second half.
unsafe fn split_half(head: *mut FreeChunk) -> *mut FreeChunk {
  unsafe {
    let mut slow = head;
    let mut fast = (*head).next;

    while !fast.is_null() {
      fast = (*fast).next;
      if !fast.is_null() {
        slow = (*slow).next;
        fast = (*fast).next;
      }
    }

    let back = (*slow).next;
    (*slow).next = ptr::null_mut();
    back
  }
}

unsafe fn merge(
  mut left: *mut FreeChunk,
  mut right: *mut FreeChunk,
) -> *mut FreeChunk {
  unsafe {
    let mut head: *mut FreeChunk = ptr::null_mut();
    let mut tail: *mut *mut FreeChunk = &raw mut head;

    while !left.is_null() && !right.is_null() {
      let lowest = if (left as usize) < (right as usize) {
        let lowest = left;
        left = (*left).next;
        lowest
      } else {
        let lowest = right;
        right = (*right).next;
        lowest
      };

      *tail = lowest;
      tail = &raw mut (*lowest).next;
    }

    *tail = if left.is_null() { right } else { left };
    head
  }
}
