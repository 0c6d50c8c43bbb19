//! Centralized Constants
//!
//! Defaults and timing tables shared by the serial and I2C drivers.
//!
//! Hardware register bit definitions remain in [`crate::register`].

// =============================================================================
// Clocks
// =============================================================================

/// Internal high-speed oscillator frequency (reset clock source)
pub const HSI_CLOCK_HZ: u32 = 16_000_000;

/// Nanoseconds per second, the unit of the I2C timing tables
pub const NS_PER_SECOND: u32 = 1_000_000_000;

// =============================================================================
// Serial Defaults
// =============================================================================

/// Default line speed (bits per second)
pub const DEFAULT_LINE_SPEED: u32 = 115_200;

/// Default transmit ring size for a buffered stream
pub const DEFAULT_TX_BUFFER: usize = 256;

/// Default receive ring size for a buffered stream
pub const DEFAULT_RX_BUFFER: usize = 256;

// =============================================================================
// I2C Defaults
// =============================================================================

/// Default transaction queue depth
pub const DEFAULT_I2C_QUEUE_DEPTH: usize = 64;

/// Standard-mode bus speed (Hz)
pub const I2C_STANDARD_SPEED: u32 = 100_000;

/// Fast-mode bus speed (Hz)
pub const I2C_FAST_SPEED: u32 = 400_000;

/// Fast-mode-plus bus speed (Hz)
pub const I2C_FAST_PLUS_SPEED: u32 = 1_000_000;

/// 10-bit address header prefix (`11110xx0`)
pub const I2C_TEN_BIT_HEADER: u8 = 0xF0;

// =============================================================================
// I2C Timing Tables (ns), indexed Standard / Fast / Fast-plus
// =============================================================================

/// Minimum SCL high period
pub const I2C_T_HIGH_MIN: [u32; 3] = [4000, 600, 260];
/// Minimum SCL low period
pub const I2C_T_LOW_MIN: [u32; 3] = [4700, 1300, 500];
/// Maximum rise time
pub const I2C_T_RISE: [u32; 3] = [1000, 300, 120];
/// Maximum fall time
pub const I2C_T_FALL: [u32; 3] = [300, 300, 120];
/// Minimum data setup time
pub const I2C_T_SU_DAT: [u32; 3] = [250, 100, 50];
/// Maximum data valid time
pub const I2C_T_VD_DAT: [u32; 3] = [3450, 900, 450];
/// Minimum data hold time
pub const I2C_T_HD_DAT: [u32; 3] = [0, 0, 0];
/// Analog filter minimum delay
pub const I2C_T_AF_MIN: u32 = 50;
/// Analog filter maximum delay
pub const I2C_T_AF_MAX: u32 = 150;

// =============================================================================
// Event Queue
// =============================================================================

/// Default depth of the posted-completion queue
pub const DEFAULT_EVENT_QUEUE_DEPTH: usize = 128;
