/// Granule every chunk size and every returned address is a multiple of.
pub const ALIGNMENT: usize = 8;

/// Rounds the given byte count up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use freelist_alloc::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(8), 8);
/// assert_eq!(align!(13 + 8), 24);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    (($value) + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Same as [`align!`] but returns `None` instead of wrapping on overflow.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(padded) => Some(padded & !(ALIGNMENT - 1)),
    None => None,
  }
}
