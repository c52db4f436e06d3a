use std::io::Read;

use freelist_alloc::{FreeListAllocator, Sbrk};

/// Waits until the user presses ENTER, so the heap can be inspected with
/// `pmap`, `gdb` or similar between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(
  label: &str,
  allocator: &FreeListAllocator<Sbrk>,
) {
  println!(
    "[{}] PID = {}, program break = {:#x}, grown {} times ({} bytes)",
    label,
    std::process::id(),
    allocator.heap_boundary(),
    allocator.growth_count(),
    allocator.footprint(),
  );
}

fn print_free_list(allocator: &FreeListAllocator<Sbrk>) {
  let mut node = allocator.list_begin();
  print!("    free list:");
  while let Some(current) = node {
    print!(" [{:#x} +{}]", current.address(), current.size());
    node = allocator.list_next(node);
  }
  println!();
}

fn print_alloc(
  size: usize,
  address: *mut u8,
  allocator: &FreeListAllocator<Sbrk>,
) {
  println!("Allocated {} bytes, address = {:?}", size, address);
  print_free_list(allocator);
}

fn main() {
  env_logger::init();

  let mut allocator = FreeListAllocator::new(Sbrk::new());

  unsafe {
    print_program_break("start", &allocator);
    block_until_enter_pressed();

    // 1) The first request grows the heap by one 8 KiB unit and is sliced
    //    off its end.
    let first = allocator.allocate(4);
    println!("\n[1] Allocate 4 bytes");
    print_alloc(4, first, &allocator);
    first.cast::<u32>().write(0xDEADBEEF);
    print_program_break("after first", &allocator);
    block_until_enter_pressed();

    // 2) Odd sizes are rounded up to 8 bytes, header included.
    let second = allocator.allocate(12);
    println!("\n[2] Allocate 12 bytes");
    print_alloc(12, second, &allocator);
    second.write_bytes(0xAB, 12);
    block_until_enter_pressed();

    // 3) Freeing pushes the chunk on the head of the free list.
    allocator.deallocate(first);
    println!("\n[3] Deallocated {:?}", first);
    print_free_list(&allocator);
    block_until_enter_pressed();

    // 4) A request that fits the head reuses the chunk just freed.
    let third = allocator.allocate(2);
    println!("\n[4] Allocate 2 bytes");
    print_alloc(2, third, &allocator);
    println!(
      "[4] third == first? {}",
      if third == first { "Yes, the freed chunk was reused" } else { "No" }
    );
    block_until_enter_pressed();

    // 5) A request larger than the growth unit grows the heap by exactly
    //    its own chunk size.
    let big = allocator.allocate(64 * 1024);
    println!("\n[5] Allocate 64 KiB");
    print_alloc(64 * 1024, big, &allocator);
    print_program_break("after large alloc", &allocator);
    block_until_enter_pressed();

    // 6) Free everything and merge the neighbours back together.
    allocator.deallocate(second);
    allocator.deallocate(third);
    allocator.deallocate(big);
    println!("\n[6] Deallocated everything");
    print_free_list(&allocator);

    allocator.coalesce();
    println!("[6] After coalescing");
    print_free_list(&allocator);

    println!("\n[7] End of example. The program break never moves back down.");
  }
}
