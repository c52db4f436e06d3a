use crate::{align::ALIGNMENT, chunk::MIN_FREE_CHUNK, error::ConfigError};

/// Bytes requested from the growth capability when the free list has no fit.
pub const DEFAULT_GROWTH_UNIT: usize = 8192;

/// Tunables of a [`FreeListAllocator`](crate::FreeListAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  growth_unit: usize,
}

impl HeapConfig {
  pub const DEFAULT: Self = Self {
    growth_unit: DEFAULT_GROWTH_UNIT,
  };

  /// Builds a config growing the heap by at least `growth_unit` bytes at a
  /// time. Requests larger than the unit grow by exactly their chunk size.
  pub const fn new(growth_unit: usize) -> Result<Self, ConfigError> {
    if growth_unit % ALIGNMENT != 0 {
      return Err(ConfigError::UnalignedGrowthUnit(growth_unit));
    }
    if growth_unit < MIN_FREE_CHUNK {
      return Err(ConfigError::GrowthUnitTooSmall {
        unit: growth_unit,
        min: MIN_FREE_CHUNK,
      });
    }

    Ok(Self { growth_unit })
  }

  pub const fn growth_unit(&self) -> usize {
    self.growth_unit
  }

  /// Size of the growth step needed to satisfy a chunk of `chunk_size` bytes.
  pub(crate) const fn growth_for(
    &self,
    chunk_size: usize,
  ) -> usize {
    if chunk_size > self.growth_unit {
      chunk_size
    } else {
      self.growth_unit
    }
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
