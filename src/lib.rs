//! STM32 Serial and I2C Transfer Drivers
//!
//! A `no_std`, `no_alloc` driver layer for the USART and I2C peripherals of
//! STM32F4 and STM32F7 parts, built around interrupt- and DMA-driven transfers.
//!
//! # Architecture
//!
//! The crate is organized into four layers:
//!
//! 1. **Register Layer** ([`register`]): Word access to peripheral blocks, plus
//!    the F4/F7 register maps
//! 2. **HAL Layer** ([`hal`]): Interfaces to what the drivers consume but do not
//!    own (clocks, DMA channels, interrupt lines)
//! 3. **Driver Layer** ([`driver`]): [`BufferedStream`] (ring-buffered serial
//!    byte stream) and [`TransactionEngine`] (queued I2C master)
//! 4. **Completion Layer** ([`sync`]): [`Completion`] slots, the [`Context`]
//!    that posts them, and ISR-safe cells
//!
//! All driver methods take `&self`, so drivers live in `static`s shared between
//! the foreground and interrupt handlers. Shared state is either atomic or
//! guarded by a `critical-section` lock.
//!
//! # Features
//!
//! - `stm32f7` (default): USART and I2C register layout of the F7 family
//! - `stm32f4`: USART and I2C register layout of the F4 family
//! - `defmt`: Enable defmt logging and formatting for error types
//! - `async`: Enable `Completion::wait()` with ISR-safe wakers
//!
//! Both layouts are always compiled; the feature only selects [`DefaultUsart`]
//! and [`DefaultI2c`].
//!
//! # Example
//!
//! ```ignore
//! use ph_stm32_xfer::{
//!     BufferedStream, Completion, DefaultI2c, DefaultUsart, I2cConfig, Mmio, SerialConfig,
//!     SystemContext, Transaction, TransactionEngine, TransferBinding,
//! };
//! use ph_stm32_xfer::hal::{ClockChannel, FixedClocks};
//!
//! static CONTEXT: SystemContext<FixedClocks, 128> =
//!     SystemContext::new(FixedClocks::uniform(54_000_000), cortex_m::asm::wfi);
//!
//! static UART: BufferedStream<'static, Mmio, DefaultUsart, _, Dma, 256, 256> =
//!     BufferedStream::new(
//!         unsafe { Mmio::new(0x4000_4400) },
//!         &CONTEXT,
//!         ClockChannel::Apb1,
//!         TransferBinding::new(Some(&DMA1_S6), Some(&DMA1_S5)),
//!     );
//!
//! UART.line().configure(&SerialConfig::new())?;
//! UART.start(Some(&USART2_IRQ));
//! UART.write(b"ready\r\n");
//!
//! static SENSOR: Completion = Completion::new();
//! let mut reading = [0u8; 2];
//! let transaction = Transaction::write_read(0x48, &[0x00], &mut reading, &SENSOR);
//! unsafe { I2C1.submit(&transaction) };
//! SENSOR.wait().await.into_result()?;
//! ```
//!
//! # Memory Requirements
//!
//! A stream holds its two rings inline (`TX + RX` bytes). An engine holds one
//! pointer per queue slot; transactions and their buffers stay caller-owned.

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

#[cfg(all(feature = "stm32f4", feature = "stm32f7"))]
compile_error!("Features 'stm32f4' and 'stm32f7' are mutually exclusive.");

#[cfg(not(any(feature = "stm32f4", feature = "stm32f7")))]
compile_error!("Either feature 'stm32f4' or 'stm32f7' must be enabled. The default is 'stm32f7'.");

pub mod constants;
pub mod driver;
pub mod hal;
pub mod register;
pub mod ring;
pub mod sync;

// Host-test mocks (registers, DMA, context)
#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{
    AddressMode, DutyCycle, FlowControl, I2cConfig, Oversampling, Parity, Part, SerialConfig,
    SerialInterrupt, StopBits, WordLength,
};
pub use driver::engine::{EngineState, Transaction, TransactionEngine};
pub use driver::error::{
    BusError, ConfigError, ConfigResult, Error, Result, SerialError,
};
pub use driver::i2c::{I2cF4, I2cF7, I2cHardware};
pub use driver::line::{LineDriver, SerialHandler};
pub use driver::stream::{BufferedStream, DataPath};
pub use driver::binding::TransferBinding;
pub use register::{Mmio, RegisterAccess, UsartF4, UsartF7, UsartLayout};
pub use ring::RingBuffer;
pub use sync::{Completion, Context, EventQueue, EventResult, SystemContext};

/// USART register layout of the selected family
#[cfg(feature = "stm32f7")]
pub type DefaultUsart = UsartF7;

/// USART register layout of the selected family
#[cfg(all(feature = "stm32f4", not(feature = "stm32f7")))]
pub type DefaultUsart = UsartF4;

/// I2C hardware strategy of the selected family
#[cfg(feature = "stm32f7")]
pub type DefaultI2c<R> = I2cF7<R>;

/// I2C hardware strategy of the selected family
#[cfg(all(feature = "stm32f4", not(feature = "stm32f7")))]
pub type DefaultI2c<R> = I2cF4<R>;
