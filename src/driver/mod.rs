//! Serial stream and I2C master drivers.
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error types and result aliases
//! - [`interrupt`] - Decoded USART and I2C status flags
//! - [`line`] - USART register driver ([`LineDriver`])
//! - [`binding`] - DMA channels assigned to a peripheral ([`TransferBinding`])
//! - [`stream`] - Ring-buffered serial stream ([`BufferedStream`])
//! - [`i2c`] - F4/F7 I2C hardware strategies
//! - [`engine`] - Queued I2C master ([`TransactionEngine`])
//!
//! # Example
//!
//! ```ignore
//! use ph_stm32_xfer::driver::{SerialConfig, Parity};
//!
//! let config = SerialConfig::new()
//!     .with_speed(57_600)
//!     .with_parity(Parity::Even);
//! ```

// Submodules
pub mod binding;
pub mod config;
pub mod engine;
pub mod error;
pub mod i2c;
pub mod interrupt;
pub mod line;
pub mod stream;

// Re-exports for convenience
pub use binding::TransferBinding;
pub use config::{
    AddressMode, DutyCycle, FlowControl, I2cConfig, Oversampling, Parity, Part, SerialConfig,
    SerialInterrupt, StopBits, WordLength,
};
pub use engine::{EngineState, Transaction, TransactionEngine};
pub use error::{BusError, ConfigError, ConfigResult, Error, Result, SerialError};
pub use i2c::{Direction, I2cF4, I2cF7, I2cHardware, StartRequest};
pub use interrupt::{BusStatus, LineStatus};
pub use line::{LineDriver, SerialHandler};
pub use stream::{BufferedStream, DataPath, receive_delta};
