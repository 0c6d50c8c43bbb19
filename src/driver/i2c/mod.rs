//! I2C master hardware strategies
//!
//! The transaction state machine in [`crate::driver::engine`] is written once
//! against [`I2cHardware`]. The two silicon generations differ only in how a
//! start condition and target address reach the wire:
//!
//! - [`I2cF4`]: software-sequenced. The CPU writes the address byte (or the
//!   10-bit header and low byte) after each SB/ADD10 event, and clears ADDR
//!   by reading SR2. There is no byte counter; the end of a read phase is the
//!   read DMA's completion.
//! - [`I2cF7`]: hardware-sequenced. One CR2 write carries address, direction,
//!   byte count and auto-end; the peripheral raises TC or STOPF when the
//!   count runs out.
//!
//! Timing computation (F4 CCR/TRISE, F7 TIMINGR) lives with each strategy.

pub mod f4;
pub mod f7;

pub use f4::I2cF4;
pub use f7::I2cF7;

use super::config::{AddressMode, I2cConfig};
use super::error::ConfigResult;
use super::interrupt::BusStatus;

/// Transfer direction of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Master transmits
    Write,
    /// Master receives
    Read,
}

impl Direction {
    /// R/W bit of the address byte
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Direction::Write => 0,
            Direction::Read => 1,
        }
    }
}

/// Parameters of one (repeated) start condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartRequest {
    /// Target address (7 or 10 bits, unshifted)
    pub address: u16,
    /// Address width
    pub mode: AddressMode,
    /// Direction of the phase that follows
    pub direction: Direction,
    /// Bytes in the phase
    pub count: usize,
    /// Generate a stop once `count` bytes have moved
    pub auto_stop: bool,
    /// Repeated start (bus already held)
    pub restart: bool,
}

/// Register-level operations of one I2C peripheral in master mode.
///
/// Implementations only map operations onto register fields; they keep no
/// protocol state.
pub trait I2cHardware {
    /// Largest phase the hardware can count (or the DMA can move)
    const MAX_TRANSFER: usize;

    /// The read phase ends when the read DMA completes (no hardware counter)
    const STOP_ON_READ_DMA_COMPLETE: bool;

    /// Program bus timing for `config` from a `clock` Hz kernel clock.
    ///
    /// Returns the achieved SCL frequency.
    fn set_timing(&self, clock: u32, config: &I2cConfig) -> ConfigResult<u32>;

    /// Bus addresses of the (transmit, receive) data registers
    fn data_register_addresses(&self) -> (usize, usize);

    /// Enable the peripheral.
    fn enable(&self);

    /// Disable the peripheral; aborts whatever it was doing.
    fn disable(&self);

    /// Peripheral enabled
    fn is_enabled(&self) -> bool;

    /// Enable or disable DMA requests for both directions.
    fn set_dma_requests(&self, enable: bool);

    /// Enable or disable the event and error interrupt sources.
    fn set_interrupts(&self, event: bool, error: bool);

    /// Issue a (repeated) start condition.
    fn start(&self, request: &StartRequest);

    /// Issue a stop condition.
    fn stop(&self);

    /// Read and decode the status register.
    fn status(&self) -> BusStatus;

    /// Clear the clearable flags of `status`.
    fn clear(&self, status: &BusStatus);

    /// Put an address byte on the wire (software-sequenced parts only).
    fn send_address(&self, _byte: u8) {}

    /// Finish the address phase (software-sequenced parts only).
    ///
    /// With `single_byte_read` the only byte must be NACKed and followed by
    /// a stop, both programmed before the address phase is released.
    fn acknowledge_address(&self, _single_byte_read: bool) {}
}
