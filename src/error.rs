use thiserror::Error;

/// Reasons an allocation request can fail.
///
/// The raw-pointer API ([`allocate`](crate::FreeListAllocator::allocate))
/// reports every variant as a null pointer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// A zero-byte request.
  #[error("requested size must be positive")]
  InvalidSize,
  /// The chunk needed for the request overflows or does not fit the
  /// allocated-size tag.
  #[error("request of {size} bytes is too large for a single chunk")]
  TooLarge { size: usize },
  /// The heap growth capability could not provide more address space.
  #[error("heap growth of {requested} bytes failed")]
  OutOfMemory { requested: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
  #[error("growth unit {0} is not a multiple of {align}", align = crate::align::ALIGNMENT)]
  UnalignedGrowthUnit(usize),
  #[error("growth unit {unit} is smaller than the minimum free chunk ({min} bytes)")]
  GrowthUnitTooSmall { unit: usize, min: usize },
}

pub type Result<T> = core::result::Result<T, AllocError>;
