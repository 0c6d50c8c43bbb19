//! Memory-mapped register access for the USART and I2C peripherals
//!
//! Registers are reached through the [`RegisterAccess`] trait rather than
//! bit-field structs laid over raw memory. Fields are described by [`Field`]
//! (shift + width) and read or written with masked get/set on a plain `u32`.
//!
//! [`Mmio`] is the volatile implementation used on hardware. Host tests
//! substitute a recording mock, so every driver stays testable off-target.
//!
//! Two silicon generations are supported. Their register maps are described by
//! the strategy types in [`usart`] and [`i2c`]; the protocol logic that uses
//! them is shared.

pub mod i2c;
pub mod usart;

pub use usart::{UsartF4, UsartF7, UsartLayout};

// =============================================================================
// Fields
// =============================================================================

/// A contiguous bit field inside a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    /// Create a field `width` bits wide starting at bit `shift`.
    #[must_use]
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Single-bit field at `bit`.
    #[must_use]
    pub const fn bit(bit: u32) -> Self {
        Self::new(bit, 1)
    }

    /// Mask of the field in register position.
    #[inline(always)]
    #[must_use]
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            ((1u32 << self.width) - 1) << self.shift
        }
    }

    /// Extract the field value from a register value.
    #[inline(always)]
    #[must_use]
    pub const fn get(&self, reg: u32) -> u32 {
        (reg & self.mask()) >> self.shift
    }

    /// Return `reg` with the field replaced by `value` (excess bits discarded).
    #[inline(always)]
    #[must_use]
    pub const fn set(&self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask()) | ((value << self.shift) & self.mask())
    }
}

// =============================================================================
// Register Access
// =============================================================================

/// Word access to one peripheral's register block.
///
/// Offsets are byte offsets from the block base. Implementations own no memory;
/// they only describe where the block lives.
pub trait RegisterAccess {
    /// Read the register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: usize, value: u32);

    /// Bus address of the register at `offset` (for DMA peripheral ends).
    fn address(&self, offset: usize) -> usize;

    /// Read-modify-write.
    #[inline(always)]
    fn modify<F>(&self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    /// Set bits (read-modify-write).
    #[inline(always)]
    fn set_bits(&self, offset: usize, bits: u32) {
        self.modify(offset, |v| v | bits);
    }

    /// Clear bits (read-modify-write).
    #[inline(always)]
    fn clear_bits(&self, offset: usize, bits: u32) {
        self.modify(offset, |v| v & !bits);
    }

    /// Set or clear bits depending on `enable`.
    #[inline(always)]
    fn change_bits(&self, offset: usize, bits: u32, enable: bool) {
        if enable {
            self.set_bits(offset, bits);
        } else {
            self.clear_bits(offset, bits);
        }
    }

    /// Read a field.
    #[inline(always)]
    fn field(&self, offset: usize, field: Field) -> u32 {
        field.get(self.read(offset))
    }

    /// Replace a field, leaving the rest of the register untouched.
    #[inline(always)]
    fn set_field(&self, offset: usize, field: Field, value: u32) {
        self.modify(offset, |v| field.set(v, value));
    }
}

/// Volatile memory-mapped register block.
///
/// Deliberately not `Clone`: one instance stands for one peripheral for the
/// life of the program.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Register block at `base`.
    ///
    /// # Safety
    /// `base` must be the address of a peripheral register block that stays
    /// mapped for the life of the returned value, and nothing else may drive
    /// that peripheral concurrently.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the block.
    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl RegisterAccess for Mmio {
    #[inline(always)]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: construction guarantees a valid, aligned register block.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline(always)]
    fn write(&self, offset: usize, value: u32) {
        // SAFETY: construction guarantees a valid, aligned register block.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    #[inline(always)]
    fn address(&self, offset: usize) -> usize {
        self.base + offset
    }
}

// SAFETY: Mmio is only an address; all access is volatile word access, and
// ownership of the peripheral is asserted by the caller of `Mmio::new`.
unsafe impl Sync for Mmio {}
