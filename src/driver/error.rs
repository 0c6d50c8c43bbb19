//! Error types for the serial stream and I2C transaction engine
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Configuration-time failures (speed, frame shape, timing)
//! - [`SerialError`]: Line errors classified from the USART status word
//! - [`BusError`]: I2C bus conditions that abort an in-flight transaction
//!
//! Serial errors are advisory: they are forwarded to a pending read but never
//! stop reception. Bus errors abort only the transaction that was in flight.
//!
//! The unified [`Error`] enum wraps all domain errors.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration errors
///
/// These errors occur while programming line speed, frame shape, bus timing
/// or DMA memory regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Requested speed is zero or not reachable from the bus clock
    InvalidSpeed,
    /// Word length not supported by this register layout
    UnsupportedWordLength,
    /// Clock provider reported 0 Hz for the peripheral's channel
    ClockUnavailable,
    /// Bus timing cannot be met with the available prescaler range
    TimingOutOfRange,
    /// Memory region is null, empty or wraps the address space
    InvalidRegion,
    /// No DMA channel bound for a transfer that needs one
    ChannelUnavailable,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::InvalidSpeed => "invalid speed",
            ConfigError::UnsupportedWordLength => "unsupported word length",
            ConfigError::ClockUnavailable => "clock unavailable",
            ConfigError::TimingOutOfRange => "bus timing out of range",
            ConfigError::InvalidRegion => "invalid memory region",
            ConfigError::ChannelUnavailable => "no DMA channel bound",
        }
    }
}

// =============================================================================
// Serial Line Errors
// =============================================================================

/// Serial line errors
///
/// Raised by [`LineDriver::on_interrupt`](crate::driver::line::LineDriver::on_interrupt)
/// in the fixed order overrun, framing, parity, noise, line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Parity check failed on a received word
    Parity,
    /// Stop bit not found where expected
    Framing,
    /// Noise detected on a received word
    Noise,
    /// Receive register overwritten before it was read
    Overrun,
    /// Break condition detected on the line
    LineBreak,
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SerialError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SerialError::Parity => "parity error",
            SerialError::Framing => "framing error",
            SerialError::Noise => "noise detected",
            SerialError::Overrun => "overrun error",
            SerialError::LineBreak => "line break",
        }
    }
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            SerialError::Overrun => embedded_io::ErrorKind::OutOfMemory,
            SerialError::LineBreak => embedded_io::ErrorKind::Interrupted,
            SerialError::Parity | SerialError::Framing | SerialError::Noise => {
                embedded_io::ErrorKind::InvalidData
            }
        }
    }
}

// =============================================================================
// I2C Bus Errors
// =============================================================================

/// I2C bus errors
///
/// Any of these aborts the in-flight transaction. The engine never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Misplaced start or stop condition
    Bus,
    /// Another master won arbitration
    ArbitrationLost,
    /// Addressed device did not acknowledge
    AcknowledgeFailure,
    /// Data register overrun or underrun
    OverrunUnderrun,
    /// Clock stretching or bus-idle timeout
    Timing,
    /// SMBus alert raised
    ProtocolAlert,
    /// Packet error checking failed
    PacketErrorCheck,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BusError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BusError::Bus => "bus error",
            BusError::ArbitrationLost => "arbitration lost",
            BusError::AcknowledgeFailure => "acknowledge failure",
            BusError::OverrunUnderrun => "overrun/underrun",
            BusError::Timing => "timeout",
            BusError::ProtocolAlert => "SMBus alert",
            BusError::PacketErrorCheck => "PEC error",
        }
    }
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            BusError::Bus => ErrorKind::Bus,
            BusError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            BusError::AcknowledgeFailure => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            BusError::OverrunUnderrun => ErrorKind::Overrun,
            BusError::Timing | BusError::ProtocolAlert | BusError::PacketErrorCheck => {
                ErrorKind::Other
            }
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::InvalidSpeed)) => { /* ... */ }
///     Err(Error::Bus(BusError::AcknowledgeFailure)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// Serial line error
    Serial(SerialError),
    /// I2C bus error
    Bus(BusError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Serial(e) => write!(f, "serial: {}", e.as_str()),
            Error::Bus(e) => write!(f, "bus: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Error::Serial(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Error::Bus(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================
