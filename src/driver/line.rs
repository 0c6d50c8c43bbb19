//! USART line driver
//!
//! [`LineDriver`] programs line speed, frame shape and flow control, and turns
//! the status word seen on each interrupt into discrete notifications for a
//! [`SerialHandler`]. It owns no buffers; [`BufferedStream`] builds the
//! byte-stream API on top of it.
//!
//! All methods take `&self`. The register block is shared between foreground
//! configuration and the interrupt handler, and every register write is a
//! single word access.
//!
//! [`BufferedStream`]: super::stream::BufferedStream

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use super::config::{
    FlowControl, Oversampling, Parity, Part, SerialConfig, SerialInterrupt, StopBits, WordLength,
};
use super::error::{ConfigError, ConfigResult, SerialError};
use super::interrupt::LineStatus;
use crate::hal::clock::{ClockChange, ClockChangeHandler, ClockChannel, ClockProvider};
use crate::register::usart::{
    BRR_FRACTION, BRR_MANTISSA, CR1_IDLEIE, CR1_OVER8, CR1_PCE, CR1_PEIE, CR1_PS, CR1_RE,
    CR1_RXNEIE, CR1_TCIE, CR1_TE, CR1_TXEIE, CR2_LBDIE, CR2_STOP, CR3_CTSE, CR3_DMAR, CR3_DMAT,
    CR3_EIE, CR3_RTSE, STATUS_FE, STATUS_IDLE, STATUS_LBD, STATUS_NF, STATUS_ORE, STATUS_PE,
    STATUS_RXNE, STATUS_TC, STATUS_TXE,
};
use crate::register::{RegisterAccess, UsartLayout};

/// Largest value the BRR mantissa field holds
const MANTISSA_MAX: u32 = 0xFFF;

/// Data register width (9-bit words)
const DATA_MASK: u16 = 0x1FF;

// =============================================================================
// Handler
// =============================================================================

/// Receiver of the notifications raised by [`LineDriver::on_interrupt`].
///
/// Called in interrupt context. Every method has a no-op default so that a
/// consumer only implements the paths it arms.
pub trait SerialHandler {
    /// A line error was observed.
    fn error(&self, _kind: SerialError) {}

    /// A word arrived. Return `false` to disarm the receive interrupt (no
    /// room left); it stays disarmed until the consumer re-enables it.
    fn data_received(&self, _data: u16) -> bool {
        false
    }

    /// Transmit register is empty. Return the next word, or `None` to
    /// disarm the transmit interrupt.
    fn transmit_ready(&self) -> Option<u16> {
        None
    }

    /// The last word has left the shift register. One-shot: the interrupt
    /// is disarmed before this is called.
    fn transmit_complete(&self) {}

    /// The line went idle after activity.
    fn idle(&self) {}
}

// =============================================================================
// Line Driver
// =============================================================================

/// USART protocol layer over a register block `R` with layout `V`.
///
/// # Type Parameters
/// * `R` - Register access ([`Mmio`](crate::register::Mmio) on hardware)
/// * `V` - Register layout strategy ([`UsartF4`](crate::register::UsartF4) or
///   [`UsartF7`](crate::register::UsartF7))
/// * `C` - Clock provider queried for the peripheral clock
///
/// # Example
///
/// ```ignore
/// let line: LineDriver<Mmio, UsartF7, _> =
///     LineDriver::new(unsafe { Mmio::new(0x4000_4400) }, &CLOCKS, ClockChannel::Apb1);
/// let achieved = line.configure(&SerialConfig::new().with_speed(921_600))?;
/// line.enable(Part::Both);
/// ```
pub struct LineDriver<R, V, C> {
    regs: R,
    clocks: C,
    channel: ClockChannel,
    /// Last requested speed; 0 until one is set
    speed: AtomicU32,
    _layout: PhantomData<V>,
}

impl<R, V, C> LineDriver<R, V, C>
where
    R: RegisterAccess,
    V: UsartLayout,
    C: ClockProvider,
{
    /// Create a driver for the block at `regs`, clocked from `channel`.
    ///
    /// This is a const function suitable for static initialization. Nothing
    /// is written to the peripheral until it is configured.
    pub const fn new(regs: R, clocks: C, channel: ClockChannel) -> Self {
        Self {
            regs,
            clocks,
            channel,
            speed: AtomicU32::new(0),
            _layout: PhantomData,
        }
    }

    /// Register block
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Clock provider
    pub fn clocks(&self) -> &C {
        &self.clocks
    }

    /// Last requested line speed (0 if never set)
    pub fn speed(&self) -> u32 {
        self.speed.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Apply a complete line configuration.
    ///
    /// The peripheral is disabled first; call [`enable`](Self::enable)
    /// afterwards. Returns the achieved line speed.
    ///
    /// # Errors
    /// - `ClockUnavailable` - Clock provider reports 0 Hz
    /// - `InvalidSpeed` - Speed is zero or out of divisor range
    /// - `UnsupportedWordLength` - Word length not available on this layout
    pub fn configure(&self, config: &SerialConfig) -> ConfigResult<u32> {
        self.disable(Part::Both);
        self.regs.change_bits(
            V::CR1,
            CR1_OVER8,
            config.oversampling == Oversampling::By8,
        );
        let achieved = self.set_speed(config.speed)?;
        self.set_frame_shape(config.word_length, config.parity, config.stop_bits)?;
        self.set_flow_control(config.flow_control);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "serial configured: requested {} bps, achieved {} bps",
            config.speed,
            achieved
        );

        Ok(achieved)
    }

    /// Program the baud divisor for `speed` and return the achieved rate.
    ///
    /// The divisor is `round(clock / speed)`; it is split into mantissa and
    /// fraction using the current oversampling factor as the fraction radix
    /// and written in one store. The requested speed is cached so that the
    /// divisor can be re-derived after a clock change.
    ///
    /// # Errors
    /// - `ClockUnavailable` - Clock provider reports 0 Hz
    /// - `InvalidSpeed` - Speed is zero or out of divisor range
    pub fn set_speed(&self, speed: u32) -> ConfigResult<u32> {
        let clock = self.clocks.frequency(self.channel);
        if clock == 0 {
            return Err(ConfigError::ClockUnavailable);
        }
        if speed == 0 {
            return Err(ConfigError::InvalidSpeed);
        }

        let divider = (u64::from(clock) + u64::from(speed / 2)) / u64::from(speed);
        let divider = u32::try_from(divider).map_err(|_| ConfigError::InvalidSpeed)?;
        let factor = self.oversampling().factor();
        let mantissa = divider / factor;
        if divider == 0 || mantissa > MANTISSA_MAX {
            return Err(ConfigError::InvalidSpeed);
        }

        let brr = BRR_MANTISSA.set(BRR_FRACTION.set(0, divider % factor), mantissa);
        self.regs.write(V::BRR, brr);
        self.speed.store(speed, Ordering::Relaxed);

        Ok((clock + divider / 2) / divider)
    }

    /// Current oversampling mode
    pub fn oversampling(&self) -> Oversampling {
        if self.regs.read(V::CR1) & CR1_OVER8 != 0 {
            Oversampling::By8
        } else {
            Oversampling::By16
        }
    }

    /// Change the oversampling mode, re-deriving the divisor if a speed is set.
    ///
    /// # Errors
    /// Same as [`set_speed`](Self::set_speed).
    pub fn set_oversampling(&self, oversampling: Oversampling) -> ConfigResult<()> {
        self.regs
            .change_bits(V::CR1, CR1_OVER8, oversampling == Oversampling::By8);
        match self.speed() {
            0 => Ok(()),
            speed => self.set_speed(speed).map(|_| ()),
        }
    }

    /// Program word length, parity and stop bits.
    ///
    /// # Errors
    /// - `UnsupportedWordLength` - Word length not available on this layout
    pub fn set_frame_shape(
        &self,
        word_length: WordLength,
        parity: Parity,
        stop_bits: StopBits,
    ) -> ConfigResult<()> {
        let word = V::word_length_bits(word_length).ok_or(ConfigError::UnsupportedWordLength)?;
        let parity_bits = match parity {
            Parity::None => 0,
            Parity::Even => CR1_PCE,
            Parity::Odd => CR1_PCE | CR1_PS,
        };

        self.regs.modify(V::CR1, |v| {
            (v & !(V::CR1_WORD_MASK | CR1_PCE | CR1_PS)) | word | parity_bits
        });
        self.regs.set_field(V::CR2, CR2_STOP, stop_bits.to_field());
        Ok(())
    }

    /// Program CTS/RTS hardware flow control.
    pub fn set_flow_control(&self, flow_control: FlowControl) {
        self.regs.modify(V::CR3, |v| {
            let mut v = v & !(CR3_CTSE | CR3_RTSE);
            if flow_control.cts() {
                v |= CR3_CTSE;
            }
            if flow_control.rts() {
                v |= CR3_RTSE;
            }
            v
        });
    }

    // -------------------------------------------------------------------------
    // Enable / Disable
    // -------------------------------------------------------------------------

    /// Enable the peripheral and the transmitter and/or receiver.
    pub fn enable(&self, part: Part) {
        let mut bits = V::CR1_UE;
        if part.includes_write() {
            bits |= CR1_TE;
        }
        if part.includes_read() {
            bits |= CR1_RE;
        }
        self.regs.set_bits(V::CR1, bits);
    }

    /// Disable one direction together with its interrupt enables, or shut the
    /// whole peripheral down for [`Part::Both`].
    pub fn disable(&self, part: Part) {
        let mut bits = 0;
        if part == Part::Both {
            bits |= V::CR1_UE;
        }
        if part.includes_write() {
            bits |= CR1_TE | CR1_TCIE | CR1_TXEIE;
        }
        if part.includes_read() {
            bits |= CR1_RE | CR1_RXNEIE | CR1_IDLEIE;
        }
        self.regs.clear_bits(V::CR1, bits);
    }

    /// True if the peripheral and every direction in `part` are enabled
    pub fn is_enabled(&self, part: Part) -> bool {
        let cr1 = self.regs.read(V::CR1);
        if cr1 & V::CR1_UE == 0 {
            return false;
        }
        (!part.includes_write() || cr1 & CR1_TE != 0) && (!part.includes_read() || cr1 & CR1_RE != 0)
    }

    /// Arm or disarm one interrupt source.
    pub fn enable_interrupt(&self, interrupt: SerialInterrupt, enable: bool) {
        let (offset, bit) = Self::interrupt_bit(interrupt);
        self.regs.change_bits(offset, bit, enable);
    }

    /// True if the interrupt source is armed
    pub fn is_interrupt_enabled(&self, interrupt: SerialInterrupt) -> bool {
        let (offset, bit) = Self::interrupt_bit(interrupt);
        self.regs.read(offset) & bit != 0
    }

    fn interrupt_bit(interrupt: SerialInterrupt) -> (usize, u32) {
        match interrupt {
            SerialInterrupt::TransmitEmpty => (V::CR1, CR1_TXEIE),
            SerialInterrupt::TransmitComplete => (V::CR1, CR1_TCIE),
            SerialInterrupt::ReceiveNotEmpty => (V::CR1, CR1_RXNEIE),
            SerialInterrupt::Idle => (V::CR1, CR1_IDLEIE),
            SerialInterrupt::Parity => (V::CR1, CR1_PEIE),
            SerialInterrupt::Error => (V::CR3, CR3_EIE),
            SerialInterrupt::LineBreak => (V::CR2, CR2_LBDIE),
        }
    }

    /// Route transmit and/or receive data through DMA requests.
    pub fn set_dma_requests(&self, part: Part, enable: bool) {
        let mut bits = 0;
        if part.includes_write() {
            bits |= CR3_DMAT;
        }
        if part.includes_read() {
            bits |= CR3_DMAR;
        }
        self.regs.change_bits(V::CR3, bits, enable);
    }

    // -------------------------------------------------------------------------
    // Raw data access
    // -------------------------------------------------------------------------

    /// Read one word from the receive data register.
    #[inline]
    pub fn read(&self) -> u16 {
        (self.regs.read(V::RX_DATA) as u16) & DATA_MASK
    }

    /// Write one word to the transmit data register.
    #[inline]
    pub fn write(&self, data: u16) {
        self.regs.write(V::TX_DATA, u32::from(data & DATA_MASK));
    }

    /// Raw status word
    #[inline]
    pub fn status(&self) -> LineStatus {
        LineStatus::from_raw(self.regs.read(V::STATUS))
    }

    /// Clear the transmission-complete flag (before handing a new chunk to DMA).
    pub fn clear_transmit_complete(&self) {
        V::acknowledge(&self.regs, STATUS_TC);
    }

    /// Busy-wait until the last word has left the shift register.
    pub fn wait_transmit_complete(&self) {
        self.wait_for(STATUS_TC);
    }

    /// Busy-wait until the transmit data register can take a word.
    pub fn wait_transmit_empty(&self) {
        self.wait_for(STATUS_TXE);
    }

    /// Busy-wait until a word has been received.
    pub fn wait_receive_not_empty(&self) {
        self.wait_for(STATUS_RXNE);
    }

    fn wait_for(&self, flag: u32) {
        while self.regs.read(V::STATUS) & flag == 0 {
            core::hint::spin_loop();
        }
    }

    /// Bus addresses of the transmit and receive data registers, for the
    /// peripheral end of the DMA channels.
    pub fn data_register_addresses(&self) -> (usize, usize) {
        (self.regs.address(V::TX_DATA), self.regs.address(V::RX_DATA))
    }

    // -------------------------------------------------------------------------
    // Interrupt
    // -------------------------------------------------------------------------

    /// Service the peripheral interrupt.
    ///
    /// The status word is read once. Conditions are then evaluated in a fixed
    /// order (overrun, framing, parity, noise, line break, data received,
    /// transmit ready, transmit complete, idle) and each present condition is
    /// reported to `handler` once.
    ///
    /// Overrun, framing and noise latch until the data register is read, so it
    /// is read even when no data is flagged. If data is flagged as well, that
    /// read is the word delivered to the handler.
    pub fn on_interrupt<H: SerialHandler + ?Sized>(&self, handler: &H) {
        let raw = self.regs.read(V::STATUS);
        let status = LineStatus::from_raw(raw);
        let cr1 = self.regs.read(V::CR1);

        let mut latched = None;
        if status.overrun || status.framing_error || status.noise {
            latched = Some(self.read());
        }
        if status.has_error() {
            V::acknowledge(
                &self.regs,
                raw & (STATUS_PE | STATUS_FE | STATUS_NF | STATUS_ORE | STATUS_LBD),
            );
            for kind in status.errors() {
                #[cfg(feature = "defmt")]
                defmt::warn!("serial line error: {}", kind);
                handler.error(kind);
            }
        }

        if status.rx_not_empty && cr1 & CR1_RXNEIE != 0 {
            let data = latched.unwrap_or_else(|| self.read());
            if !handler.data_received(data) {
                self.regs.clear_bits(V::CR1, CR1_RXNEIE);
            }
        }

        if status.tx_empty && cr1 & CR1_TXEIE != 0 {
            match handler.transmit_ready() {
                Some(data) => self.write(data),
                None => self.regs.clear_bits(V::CR1, CR1_TXEIE),
            }
        }

        if status.tx_complete && cr1 & CR1_TCIE != 0 {
            self.regs.clear_bits(V::CR1, CR1_TCIE);
            V::acknowledge(&self.regs, STATUS_TC);
            handler.transmit_complete();
        }

        if status.idle && cr1 & CR1_IDLEIE != 0 {
            V::acknowledge(&self.regs, STATUS_IDLE);
            handler.idle();
        }
    }
}

impl<R, V, C> ClockChangeHandler for LineDriver<R, V, C>
where
    R: RegisterAccess,
    V: UsartLayout,
    C: ClockProvider,
{
    fn clock_changed(&self, change: ClockChange) {
        if let ClockChange::Changed(_) = change {
            let speed = self.speed();
            if speed != 0 {
                if let Err(_e) = self.set_speed(speed) {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("baud divisor not re-derived after clock change: {}", _e);
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use core::cell::RefCell;
    use std::vec::Vec;

    use super::*;
    use crate::register::usart::{F4_BRR, F4_CR1, F4_DR, F4_SR, F7_CR1, F7_ICR, F7_RDR, F7_TDR};
    use crate::register::{UsartF4, UsartF7};
    use crate::testing::{MockClock, MockRegisters};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Seen {
        Error(SerialError),
        Data(u16),
        Ready,
        Complete,
        Idle,
    }

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<Seen>>,
        accept: bool,
        outgoing: RefCell<Vec<u16>>,
    }

    impl SerialHandler for Recorder {
        fn error(&self, kind: SerialError) {
            self.seen.borrow_mut().push(Seen::Error(kind));
        }

        fn data_received(&self, data: u16) -> bool {
            self.seen.borrow_mut().push(Seen::Data(data));
            self.accept
        }

        fn transmit_ready(&self) -> Option<u16> {
            self.seen.borrow_mut().push(Seen::Ready);
            self.outgoing.borrow_mut().pop()
        }

        fn transmit_complete(&self) {
            self.seen.borrow_mut().push(Seen::Complete);
        }

        fn idle(&self) {
            self.seen.borrow_mut().push(Seen::Idle);
        }
    }

    fn f4_line(clock: &MockClock) -> LineDriver<MockRegisters, UsartF4, &MockClock> {
        LineDriver::new(MockRegisters::new(), clock, ClockChannel::Apb1)
    }

    fn f7_line(clock: &MockClock) -> LineDriver<MockRegisters, UsartF7, &MockClock> {
        LineDriver::new(MockRegisters::new(), clock, ClockChannel::Apb1)
    }

    #[test]
    fn divisor_rounds_with_oversampling_by_8() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        line.registers().set(F4_CR1, CR1_OVER8);

        assert_eq!(line.set_speed(115_200), Ok(115_108));
        let brr = line.registers().get(F4_BRR);
        assert_eq!(BRR_MANTISSA.get(brr), 17);
        assert_eq!(BRR_FRACTION.get(brr), 3);
        assert_eq!(line.speed(), 115_200);
    }

    #[test]
    fn divisor_with_oversampling_by_16() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);

        assert_eq!(line.set_speed(115_200), Ok(115_108));
        assert_eq!(line.registers().get(F4_BRR), (8 << 4) | 11);
    }

    #[test]
    fn divisor_written_in_one_store() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        line.set_speed(9600).unwrap();
        assert_eq!(line.registers().writes_to(F4_BRR).len(), 1);
    }

    #[test]
    fn speed_errors() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        assert_eq!(line.set_speed(0), Err(ConfigError::InvalidSpeed));
        // divisor would be 0
        assert_eq!(line.set_speed(100_000_000), Err(ConfigError::InvalidSpeed));
        // mantissa would exceed 12 bits
        assert_eq!(line.set_speed(100), Err(ConfigError::InvalidSpeed));

        clock.set(0);
        assert_eq!(line.set_speed(9600), Err(ConfigError::ClockUnavailable));
        assert_eq!(line.speed(), 0);
    }

    #[test]
    fn clock_change_re_derives_divisor() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        line.set_speed(115_200).unwrap();

        clock.set(32_000_000);
        line.clock_changed(ClockChange::AboutToChange(32_000_000));
        assert_eq!(line.registers().get(0x0C), 139);

        line.clock_changed(ClockChange::Changed(32_000_000));
        assert_eq!(line.registers().get(0x0C), (17 << 4) | 6);
    }

    #[test]
    fn clock_change_without_speed_is_ignored() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        line.clock_changed(ClockChange::Changed(8_000_000));
        assert!(line.registers().writes_to(0x0C).is_empty());
    }

    #[test]
    fn oversampling_change_recomputes() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        line.set_speed(115_200).unwrap();
        line.set_oversampling(Oversampling::By8).unwrap();

        assert_eq!(line.oversampling(), Oversampling::By8);
        assert_eq!(line.registers().get(F4_BRR), (17 << 4) | 3);
    }

    #[test]
    fn frame_shape_parity_and_stop_bits() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        line.set_frame_shape(WordLength::Nine, Parity::Odd, StopBits::Two)
            .unwrap();

        let cr1 = line.registers().get(F4_CR1);
        assert_ne!(cr1 & (1 << 12), 0);
        assert_ne!(cr1 & CR1_PCE, 0);
        assert_ne!(cr1 & CR1_PS, 0);
        assert_eq!(line.registers().field(0x10, CR2_STOP), 2);

        line.set_frame_shape(WordLength::Eight, Parity::Even, StopBits::One)
            .unwrap();
        let cr1 = line.registers().get(F4_CR1);
        assert_eq!(cr1 & ((1 << 12) | CR1_PS), 0);
        assert_ne!(cr1 & CR1_PCE, 0);
    }

    #[test]
    fn seven_bit_words_only_on_f7() {
        let clock = MockClock::new(16_000_000);
        assert_eq!(
            f4_line(&clock).set_frame_shape(WordLength::Seven, Parity::None, StopBits::One),
            Err(ConfigError::UnsupportedWordLength)
        );

        let line = f7_line(&clock);
        line.set_frame_shape(WordLength::Seven, Parity::None, StopBits::One)
            .unwrap();
        assert_eq!(line.registers().get(F7_CR1) & UsartF7::CR1_WORD_MASK, 1 << 28);
    }

    #[test]
    fn flow_control_bits() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        line.set_flow_control(FlowControl::CtsRts);
        assert_eq!(line.registers().get(0x08) & (CR3_CTSE | CR3_RTSE), CR3_CTSE | CR3_RTSE);
        line.set_flow_control(FlowControl::Rts);
        assert_eq!(line.registers().get(0x08) & (CR3_CTSE | CR3_RTSE), CR3_RTSE);
    }

    #[test]
    fn configure_disables_then_programs() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        line.enable(Part::Both);
        assert!(line.is_enabled(Part::Both));

        let achieved = line
            .configure(&SerialConfig::new().with_oversampling(Oversampling::By8))
            .unwrap();
        assert_eq!(achieved, 115_108);
        assert!(!line.is_enabled(Part::Read));
        assert!(!line.is_enabled(Part::Write));
        assert_eq!(line.oversampling(), Oversampling::By8);
    }

    #[test]
    fn disable_one_direction_clears_its_interrupts() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        line.enable(Part::Both);
        line.enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);
        line.enable_interrupt(SerialInterrupt::TransmitComplete, true);

        line.disable(Part::Read);
        assert!(!line.is_interrupt_enabled(SerialInterrupt::ReceiveNotEmpty));
        assert!(line.is_interrupt_enabled(SerialInterrupt::TransmitComplete));
        assert!(line.is_enabled(Part::Write));
        assert!(!line.is_enabled(Part::Both));

        line.disable(Part::Both);
        assert_eq!(line.registers().get(F4_CR1) & UsartF4::CR1_UE, 0);
    }

    #[test]
    fn interrupt_sources_map_to_registers() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        line.enable_interrupt(SerialInterrupt::Error, true);
        line.enable_interrupt(SerialInterrupt::LineBreak, true);
        assert_eq!(line.registers().get(0x14) & CR3_EIE, CR3_EIE);
        assert_eq!(line.registers().get(0x10) & CR2_LBDIE, CR2_LBDIE);
    }

    #[test]
    fn dma_requests_per_part() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        line.set_dma_requests(Part::Both, true);
        line.set_dma_requests(Part::Write, false);
        assert_eq!(line.registers().get(0x08) & (CR3_DMAT | CR3_DMAR), CR3_DMAR);
    }

    #[test]
    fn data_register_addresses_per_layout() {
        let clock = MockClock::new(16_000_000);
        let (tx, rx) = f4_line(&clock).data_register_addresses();
        assert_eq!(tx, rx);

        let line = f7_line(&clock);
        let (tx, rx) = line.data_register_addresses();
        assert_eq!(tx, line.registers().address(F7_TDR));
        assert_eq!(rx, line.registers().address(F7_RDR));
    }

    #[test]
    fn overrun_without_data_still_reads_data_register() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        let handler = Recorder::default();
        line.registers().set(F4_SR, STATUS_ORE);

        line.on_interrupt(&handler);

        assert_eq!(line.registers().reads(F4_DR), 1);
        assert_eq!(*handler.seen.borrow(), [Seen::Error(SerialError::Overrun)]);
    }

    #[test]
    fn errors_reported_once_in_fixed_order() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        let handler = Recorder::default();
        line.registers()
            .set(0x1C, STATUS_PE | STATUS_FE | STATUS_NF | STATUS_ORE | STATUS_LBD);

        line.on_interrupt(&handler);

        assert_eq!(
            *handler.seen.borrow(),
            [
                Seen::Error(SerialError::Overrun),
                Seen::Error(SerialError::Framing),
                Seen::Error(SerialError::Parity),
                Seen::Error(SerialError::Noise),
                Seen::Error(SerialError::LineBreak),
            ]
        );
        assert_eq!(
            line.registers().last_write(F7_ICR),
            Some(STATUS_PE | STATUS_FE | STATUS_NF | STATUS_ORE | STATUS_LBD)
        );
    }

    #[test]
    fn line_break_written_back_on_f4() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        let handler = Recorder::default();
        line.registers().set(F4_SR, STATUS_LBD);

        line.on_interrupt(&handler);

        assert_eq!(line.registers().last_write(F4_SR).map(|v| v & STATUS_LBD), Some(0));
        assert_eq!(line.registers().reads(F4_DR), 0);
    }

    #[test]
    fn received_word_delivered_when_armed() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        let handler = Recorder {
            accept: true,
            ..Recorder::default()
        };
        line.registers().set(0x1C, STATUS_RXNE);
        line.registers().queue_read(F7_RDR, u32::from(b'x'));

        // not armed: ignored
        line.on_interrupt(&handler);
        assert!(handler.seen.borrow().is_empty());

        line.enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);
        line.on_interrupt(&handler);
        assert_eq!(*handler.seen.borrow(), [Seen::Data(u16::from(b'x'))]);
        assert!(line.is_interrupt_enabled(SerialInterrupt::ReceiveNotEmpty));
    }

    #[test]
    fn rejected_word_disarms_receive_interrupt() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        let handler = Recorder::default();
        line.registers().set(0x1C, STATUS_RXNE);
        line.enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);

        line.on_interrupt(&handler);
        assert!(!line.is_interrupt_enabled(SerialInterrupt::ReceiveNotEmpty));
    }

    #[test]
    fn overrun_read_doubles_as_data_read() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        let handler = Recorder {
            accept: true,
            ..Recorder::default()
        };
        line.registers().set(F4_SR, STATUS_ORE | STATUS_RXNE);
        line.registers().queue_read(F4_DR, 0x41);
        line.enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);

        line.on_interrupt(&handler);

        assert_eq!(line.registers().reads(F4_DR), 1);
        assert_eq!(
            *handler.seen.borrow(),
            [Seen::Error(SerialError::Overrun), Seen::Data(0x41)]
        );
    }

    #[test]
    fn transmit_ready_feeds_data_register() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        let handler = Recorder::default();
        handler.outgoing.borrow_mut().push(u16::from(b'z'));
        line.registers().set(0x1C, STATUS_TXE);
        line.enable_interrupt(SerialInterrupt::TransmitEmpty, true);

        line.on_interrupt(&handler);
        assert_eq!(line.registers().last_write(F7_TDR), Some(u32::from(b'z')));
        assert!(line.is_interrupt_enabled(SerialInterrupt::TransmitEmpty));

        line.on_interrupt(&handler);
        assert!(!line.is_interrupt_enabled(SerialInterrupt::TransmitEmpty));
        assert_eq!(*handler.seen.borrow(), [Seen::Ready, Seen::Ready]);
    }

    #[test]
    fn transmit_complete_is_one_shot() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        let handler = Recorder::default();
        line.registers().set(0x1C, STATUS_TC);
        line.enable_interrupt(SerialInterrupt::TransmitComplete, true);

        line.on_interrupt(&handler);
        line.on_interrupt(&handler);

        assert_eq!(*handler.seen.borrow(), [Seen::Complete]);
        assert_eq!(line.registers().last_write(F7_ICR), Some(STATUS_TC));
    }

    #[test]
    fn idle_acknowledged_and_reported() {
        let clock = MockClock::new(16_000_000);
        let line = f4_line(&clock);
        let handler = Recorder::default();
        line.registers().set(F4_SR, STATUS_IDLE);
        line.enable_interrupt(SerialInterrupt::Idle, true);

        line.on_interrupt(&handler);

        assert_eq!(*handler.seen.borrow(), [Seen::Idle]);
        // F4 clears IDLE with a data register read
        assert_eq!(line.registers().reads(F4_DR), 1);
    }

    #[test]
    fn events_follow_errors_in_one_entry() {
        let clock = MockClock::new(16_000_000);
        let line = f7_line(&clock);
        let handler = Recorder {
            accept: true,
            ..Recorder::default()
        };
        line.registers()
            .set(0x1C, STATUS_PE | STATUS_RXNE | STATUS_TXE | STATUS_IDLE);
        line.registers().queue_read(F7_RDR, 7);
        line.enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);
        line.enable_interrupt(SerialInterrupt::TransmitEmpty, true);
        line.enable_interrupt(SerialInterrupt::Idle, true);

        line.on_interrupt(&handler);

        assert_eq!(
            *handler.seen.borrow(),
            [
                Seen::Error(SerialError::Parity),
                Seen::Data(7),
                Seen::Ready,
                Seen::Idle,
            ]
        );
    }
}
