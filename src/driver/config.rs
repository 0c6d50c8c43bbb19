//! Configuration types for the serial and I2C drivers.

use crate::constants::{
    DEFAULT_LINE_SPEED, I2C_FAST_PLUS_SPEED, I2C_FAST_SPEED, I2C_STANDARD_SPEED,
};

// =============================================================================
// Peripheral Parts
// =============================================================================

/// Direction(s) of a peripheral an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Part {
    /// Receive side
    Read,
    /// Transmit side
    Write,
    /// Both sides; disabling it shuts the peripheral down
    #[default]
    Both,
}

impl Part {
    /// True for `Read` and `Both`
    #[inline(always)]
    #[must_use]
    pub const fn includes_read(self) -> bool {
        matches!(self, Part::Read | Part::Both)
    }

    /// True for `Write` and `Both`
    #[inline(always)]
    #[must_use]
    pub const fn includes_write(self) -> bool {
        matches!(self, Part::Write | Part::Both)
    }
}

// =============================================================================
// Serial Frame Shape
// =============================================================================

/// Word length including the parity bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordLength {
    /// 7 bits (F7 only)
    Seven,
    /// 8 bits
    #[default]
    Eight,
    /// 9 bits
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    #[default]
    One,
    /// 0.5 stop bits
    Half,
    /// 2 stop bits
    Two,
    /// 1.5 stop bits
    OneAndHalf,
}

impl StopBits {
    /// Encoding of the CR2 STOP field
    #[must_use]
    pub const fn to_field(self) -> u32 {
        match self {
            StopBits::One => 0,
            StopBits::Half => 1,
            StopBits::Two => 2,
            StopBits::OneAndHalf => 3,
        }
    }
}

/// Hardware flow control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControl {
    /// No hardware flow control
    #[default]
    None,
    /// Transmit gated by CTS
    Cts,
    /// Receive signalled with RTS
    Rts,
    /// Both CTS and RTS
    CtsRts,
}

impl FlowControl {
    /// CTS handshake enabled
    #[must_use]
    pub const fn cts(self) -> bool {
        matches!(self, FlowControl::Cts | FlowControl::CtsRts)
    }

    /// RTS handshake enabled
    #[must_use]
    pub const fn rts(self) -> bool {
        matches!(self, FlowControl::Rts | FlowControl::CtsRts)
    }
}

/// Receiver oversampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// 16 samples per bit
    #[default]
    By16,
    /// 8 samples per bit (doubles the reachable line speed)
    By8,
}

impl Oversampling {
    /// Samples per bit; also the radix of the divisor fraction field
    #[must_use]
    pub const fn factor(self) -> u32 {
        match self {
            Oversampling::By16 => 16,
            Oversampling::By8 => 8,
        }
    }
}

/// Serial interrupt sources that can be enabled individually
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialInterrupt {
    /// Transmit data register empty
    TransmitEmpty,
    /// Transmission complete
    TransmitComplete,
    /// Receive data register not empty
    ReceiveNotEmpty,
    /// Idle line detected
    Idle,
    /// Parity error
    Parity,
    /// Framing, noise and overrun errors
    Error,
    /// Line break detected
    LineBreak,
}

// =============================================================================
// Serial Configuration
// =============================================================================

/// Serial line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// Line speed in bits per second
    pub speed: u32,
    /// Word length
    pub word_length: WordLength,
    /// Parity
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Hardware flow control
    pub flow_control: FlowControl,
    /// Oversampling
    pub oversampling: Oversampling,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialConfig {
    /// 115200 baud, 8N1, no flow control, 16x oversampling
    #[must_use]
    pub const fn new() -> Self {
        Self {
            speed: DEFAULT_LINE_SPEED,
            word_length: WordLength::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            oversampling: Oversampling::By16,
        }
    }

    /// Set the line speed
    #[must_use]
    pub const fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the word length
    #[must_use]
    pub const fn with_word_length(mut self, word_length: WordLength) -> Self {
        self.word_length = word_length;
        self
    }

    /// Set the parity
    #[must_use]
    pub const fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the stop bits
    #[must_use]
    pub const fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Set the hardware flow control
    #[must_use]
    pub const fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    /// Set the oversampling
    #[must_use]
    pub const fn with_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.oversampling = oversampling;
        self
    }
}

// =============================================================================
// I2C Configuration
// =============================================================================

/// I2C clock duty cycle / speed mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DutyCycle {
    /// Standard mode, 1:1 low/high
    #[default]
    Standard,
    /// Fast mode, 2:1 low/high
    FastDuty2,
    /// Fast mode, 16:9 low/high (fast-mode-plus timing on F7)
    FastDuty16by9,
}

impl DutyCycle {
    /// Row of the timing tables in [`crate::constants`]
    #[must_use]
    pub const fn timing_index(self) -> usize {
        match self {
            DutyCycle::Standard => 0,
            DutyCycle::FastDuty2 => 1,
            DutyCycle::FastDuty16by9 => 2,
        }
    }
}

/// Target address width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressMode {
    /// 7-bit addressing
    #[default]
    SevenBit,
    /// 10-bit addressing (header + low byte)
    TenBit,
}

/// I2C master configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Maximum SCL frequency in Hz
    pub max_speed: u32,
    /// Duty cycle mode
    pub duty_cycle: DutyCycle,
    /// Address width
    pub address_mode: AddressMode,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfig {
    /// 100 kHz standard mode, 7-bit addressing
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_speed: I2C_STANDARD_SPEED,
            duty_cycle: DutyCycle::Standard,
            address_mode: AddressMode::SevenBit,
        }
    }

    /// 400 kHz fast mode, 2:1 duty
    #[must_use]
    pub const fn fast() -> Self {
        Self::new()
            .with_max_speed(I2C_FAST_SPEED)
            .with_duty_cycle(DutyCycle::FastDuty2)
    }

    /// 1 MHz fast-mode-plus timing (16:9 duty)
    #[must_use]
    pub const fn fast_plus() -> Self {
        Self::new()
            .with_max_speed(I2C_FAST_PLUS_SPEED)
            .with_duty_cycle(DutyCycle::FastDuty16by9)
    }

    /// Set the maximum bus speed
    #[must_use]
    pub const fn with_max_speed(mut self, max_speed: u32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Set the duty cycle mode
    #[must_use]
    pub const fn with_duty_cycle(mut self, duty_cycle: DutyCycle) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    /// Set the address width
    #[must_use]
    pub const fn with_address_mode(mut self, address_mode: AddressMode) -> Self {
        self.address_mode = address_mode;
        self
    }
}
