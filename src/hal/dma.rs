//! DMA channel abstraction
//!
//! The DMA controller itself is an external collaborator. Drivers only need
//! the small surface in [`DmaChannel`]: configure once, point it at a memory
//! region, start, and read back the remaining count.
//!
//! Memory is handed over as a [`MemoryRegion`] (base + length) rather than a
//! raw pointer, and regions are validated when built.

use crate::driver::error::{ConfigError, ConfigResult};

// =============================================================================
// Memory Region
// =============================================================================

/// A contiguous span of memory a DMA channel may read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryRegion {
    base: usize,
    len: usize,
}

impl MemoryRegion {
    /// Validated region: non-null, non-empty and not wrapping the address space.
    pub fn new(base: usize, len: usize) -> ConfigResult<Self> {
        if base == 0 || len == 0 || base.checked_add(len).is_none() {
            return Err(ConfigError::InvalidRegion);
        }
        Ok(Self { base, len })
    }

    /// Region covering `data` (length in bytes).
    pub fn from_slice<T>(data: &[T]) -> ConfigResult<Self> {
        Self::new(data.as_ptr() as usize, core::mem::size_of_val(data))
    }

    /// Region built from parts already known to be valid.
    pub(crate) const fn from_raw(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    /// Start address
    #[inline(always)]
    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Length in bytes
    #[inline(always)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length region
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// =============================================================================
// Channel Configuration
// =============================================================================

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    /// Peripheral data register into memory
    PeripheralToMemory,
    /// Memory into peripheral data register
    MemoryToPeripheral,
}

/// Width of one transfer unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataWidth {
    /// 8 bits
    #[default]
    Byte,
    /// 16 bits
    HalfWord,
    /// 32 bits
    Word,
}

/// Burst length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Burst {
    /// Single transfer
    #[default]
    Single,
    /// Incremental burst of 4 beats
    Incr4,
    /// Incremental burst of 8 beats
    Incr8,
    /// Incremental burst of 16 beats
    Incr16,
}

/// Which end of the channel an address applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaEnd {
    /// Peripheral data register
    Peripheral,
    /// Memory buffer
    Memory,
}

// =============================================================================
// Channel Trait
// =============================================================================

/// One DMA stream/channel bound to a peripheral request line.
///
/// Methods take `&self`: the channel is a hardware handle shared between the
/// foreground code that arms it and the completion interrupt that re-arms it.
pub trait DmaChannel {
    /// Set direction, unit width and burst length.
    fn configure(&self, direction: DmaDirection, width: DataWidth, burst: Burst);

    /// Set the address for one end of the transfer.
    fn set_address(&self, end: DmaEnd, address: usize);

    /// Number of units to transfer (reload value in circular mode).
    fn set_transfer_count(&self, count: usize);

    /// Enable the channel.
    fn start(&self);

    /// Disable the channel, abandoning any transfer in progress.
    ///
    /// Address and count can only be reprogrammed once the channel is off.
    fn stop(&self);

    /// Transfer-complete flag (the whole count has moved, not half of it).
    fn complete(&self) -> bool;

    /// Units still to transfer; counts down and reloads in circular mode.
    fn current_transfer_count(&self) -> usize;

    /// Free-running (circular) mode.
    fn set_circular(&self, circular: bool);

    /// Point the memory end at `region` and size the transfer to it.
    fn set_memory(&self, region: MemoryRegion) {
        self.set_address(DmaEnd::Memory, region.base());
        self.set_transfer_count(region.len());
    }
}
