//! Clock provider interface
//!
//! The clock tree (PLL, prescalers) is owned elsewhere. Drivers query the
//! frequency feeding their peripheral and get told when it changes so that
//! divisors and bus timing can be re-derived.

/// Clock domains a peripheral can be fed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockChannel {
    /// Core system clock
    System,
    /// AHB bus clock
    Ahb,
    /// APB1 peripheral clock (USART2-5, I2C1-3)
    #[default]
    Apb1,
    /// APB2 peripheral clock (USART1, USART6)
    Apb2,
}

/// Clock change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockChange {
    /// Clock is about to switch to the given frequency (Hz)
    AboutToChange(u32),
    /// Clock has switched to the given frequency (Hz)
    Changed(u32),
}

/// Source of peripheral clock frequencies.
pub trait ClockProvider {
    /// Current frequency of `channel` in Hz (0 if unknown).
    fn frequency(&self, channel: ClockChannel) -> u32;
}

/// Receiver of clock change notifications.
///
/// The clock owner calls this on every registered driver around a clock
/// switch. Implementations must not block.
pub trait ClockChangeHandler {
    /// Handle a clock transition.
    fn clock_changed(&self, change: ClockChange);
}

impl<T: ClockProvider + ?Sized> ClockProvider for &T {
    fn frequency(&self, channel: ClockChannel) -> u32 {
        (**self).frequency(channel)
    }
}

/// Fixed frequencies, for boards that never reconfigure the clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixedClocks {
    /// System clock (Hz)
    pub system: u32,
    /// AHB clock (Hz)
    pub ahb: u32,
    /// APB1 clock (Hz)
    pub apb1: u32,
    /// APB2 clock (Hz)
    pub apb2: u32,
}

impl FixedClocks {
    /// Every domain at the same frequency (reset state on HSI: 16 MHz).
    #[must_use]
    pub const fn uniform(hz: u32) -> Self {
        Self {
            system: hz,
            ahb: hz,
            apb1: hz,
            apb2: hz,
        }
    }
}

impl Default for FixedClocks {
    fn default() -> Self {
        Self::uniform(crate::constants::HSI_CLOCK_HZ)
    }
}

impl ClockProvider for FixedClocks {
    fn frequency(&self, channel: ClockChannel) -> u32 {
        match channel {
            ClockChannel::System => self.system,
            ClockChannel::Ahb => self.ahb,
            ClockChannel::Apb1 => self.apb1,
            ClockChannel::Apb2 => self.apb2,
        }
    }
}
