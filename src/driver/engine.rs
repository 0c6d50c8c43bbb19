//! I2C master transaction engine
//!
//! [`TransactionEngine`] runs a FIFO of caller-owned [`Transaction`]s over one
//! I2C peripheral, one at a time. Submission happens in the foreground; the
//! peripheral's event/error interrupts and the read DMA's completion drive the
//! state machine:
//!
//! | State | Trigger | Action | Next |
//! |-------|---------|--------|------|
//! | Idle | `submit` | start head | AddressPhase |
//! | AddressPhase | SB / ADD10 / ADDR (F4 only) | address bytes, 10-bit read restart | DataPhase |
//! | Address/DataPhase(Write) | TC (F7) or BTF (F4), read pending | arm read DMA, repeated start | AddressPhase(Read) |
//! | DataPhase(Write) | BTF (F4), no read | stop, post success | next |
//! | DataPhase(Read) | read DMA complete (F4) | stop, post success | next |
//! | any | STOPF | post success | next |
//! | any | NACK or bus error | disable peripheral, post error | next |
//!
//! Every transaction's completion is posted exactly once. Failed transactions
//! are never retried. When the queue runs dry, DMA requests are switched off
//! and the peripheral is disabled until the next submission.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

use super::binding::TransferBinding;
use super::config::{AddressMode, I2cConfig, Part};
use super::error::{BusError, ConfigError, ConfigResult};
use super::i2c::{Direction, I2cHardware, StartRequest};
use crate::constants::{DEFAULT_I2C_QUEUE_DEPTH, I2C_TEN_BIT_HEADER};
use crate::hal::clock::{ClockChange, ClockChangeHandler, ClockChannel};
use crate::hal::dma::{DmaChannel, MemoryRegion};
use crate::hal::interrupt::{InterruptHandler, InterruptLine};
use crate::ring::RingBuffer;
use crate::sync::{Completion, Context, CriticalSectionCell, EventResult};

/// Interrupt index meaning "no interrupt line configured"
const NO_INTERRUPT: u16 = u16::MAX;

// =============================================================================
// Transaction
// =============================================================================

/// One master operation against one target: an optional write phase followed
/// by an optional read phase, joined by a repeated start.
///
/// Borrows the caller's buffers; the engine only keeps a reference to it.
#[derive(Debug)]
pub struct Transaction<'a> {
    address: u16,
    write: Option<MemoryRegion>,
    read: Option<MemoryRegion>,
    done: &'static Completion,
    _buffers: PhantomData<&'a mut [u8]>,
}

impl<'a> Transaction<'a> {
    /// Write `data` to `address`.
    pub fn write(address: u16, data: &'a [u8], done: &'static Completion) -> Self {
        Self {
            address,
            write: MemoryRegion::from_slice(data).ok(),
            read: None,
            done,
            _buffers: PhantomData,
        }
    }

    /// Read `buf.len()` bytes from `address`.
    pub fn read(address: u16, buf: &'a mut [u8], done: &'static Completion) -> Self {
        Self {
            address,
            write: None,
            read: MemoryRegion::from_slice(buf).ok(),
            done,
            _buffers: PhantomData,
        }
    }

    /// Write `data`, then read `buf.len()` bytes without releasing the bus.
    pub fn write_read(
        address: u16,
        data: &'a [u8],
        buf: &'a mut [u8],
        done: &'static Completion,
    ) -> Self {
        Self {
            address,
            write: MemoryRegion::from_slice(data).ok(),
            read: MemoryRegion::from_slice(buf).ok(),
            done,
            _buffers: PhantomData,
        }
    }

    /// Target address
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Bytes in the write phase
    pub fn write_len(&self) -> usize {
        self.write.map_or(0, |region| region.len())
    }

    /// Bytes in the read phase
    pub fn read_len(&self) -> usize {
        self.read.map_or(0, |region| region.len())
    }

    /// Completion posted when the transaction ends
    pub fn completion(&self) -> &'static Completion {
        self.done
    }

    /// Direction and buffer of the phase that runs first
    fn first_phase(&self) -> Option<(Direction, MemoryRegion)> {
        match (self.write, self.read) {
            (Some(write), _) => Some((Direction::Write, write)),
            (None, Some(read)) => Some((Direction::Read, read)),
            (None, None) => None,
        }
    }
}

/// Queue entry: a submitted transaction, lifetime erased.
#[derive(Clone, Copy)]
struct TransactionPtr(*const Transaction<'static>);

impl TransactionPtr {
    fn new(transaction: &Transaction<'_>) -> Self {
        Self(core::ptr::from_ref(transaction).cast())
    }
}

// SAFETY: the pointer is only dereferenced while `submit`'s contract keeps the
// transaction alive, from the foreground (inside a critical section) or from
// the engine's interrupt handlers.
unsafe impl Send for TransactionPtr {}

// =============================================================================
// Engine State
// =============================================================================

/// Protocol state of the in-flight transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// No transaction in flight
    Idle,
    /// Start issued, target not yet acknowledged
    AddressPhase(Direction),
    /// Data moving
    DataPhase(Direction),
}

impl EngineState {
    const fn to_raw(self) -> u8 {
        match self {
            EngineState::Idle => 0,
            EngineState::AddressPhase(Direction::Write) => 1,
            EngineState::AddressPhase(Direction::Read) => 2,
            EngineState::DataPhase(Direction::Write) => 3,
            EngineState::DataPhase(Direction::Read) => 4,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => EngineState::AddressPhase(Direction::Write),
            2 => EngineState::AddressPhase(Direction::Read),
            3 => EngineState::DataPhase(Direction::Write),
            4 => EngineState::DataPhase(Direction::Read),
            _ => EngineState::Idle,
        }
    }

    /// Direction of the current phase
    pub const fn direction(self) -> Option<Direction> {
        match self {
            EngineState::Idle => None,
            EngineState::AddressPhase(direction) | EngineState::DataPhase(direction) => {
                Some(direction)
            }
        }
    }
}

// =============================================================================
// Transaction Engine
// =============================================================================

/// Queued I2C master.
///
/// # Type Parameters
/// * `H` - Hardware strategy ([`I2cF4`](super::i2c::I2cF4) or
///   [`I2cF7`](super::i2c::I2cF7))
/// * `X` - Runtime [`Context`]
/// * `D` - DMA channel type
/// * `Q` - Queue depth
///
/// # Example
///
/// ```ignore
/// static I2C1: TransactionEngine<'static, I2cF7<Mmio>, Ctx, Stream, 64> =
///     TransactionEngine::new(
///         I2cF7::new(unsafe { Mmio::new(0x4000_5400) }),
///         &CONTEXT,
///         ClockChannel::Apb1,
///         TransferBinding::new(Some(&DMA1_S6), Some(&DMA1_S0)),
///     );
///
/// I2C1.configure_master(&I2cConfig::new().with_max_speed(400_000))?;
/// I2C1.configure_dma();
/// I2C1.configure_interrupts(Some(&I2C1_EV), Some(&I2C1_ER));
///
/// static DONE: Completion = Completion::new();
/// let command = [0x00, 0x10];
/// let transaction = Transaction::write(0x50, &command, &DONE);
/// unsafe { I2C1.submit(&transaction) };
/// ```
pub struct TransactionEngine<'a, H, X, D, const Q: usize = DEFAULT_I2C_QUEUE_DEPTH> {
    hw: H,
    context: &'a X,
    channel: ClockChannel,
    binding: TransferBinding<'a, D>,
    queue: RingBuffer<Option<TransactionPtr>, Q>,
    state: AtomicU8,
    ten_bit: AtomicBool,
    /// 10-bit read: the header has been re-sent with the read bit
    header_resent: AtomicBool,
    /// Last configuration, re-applied after clock changes
    config: CriticalSectionCell<Option<I2cConfig>>,
    event_irq: AtomicU16,
    error_irq: AtomicU16,
}

impl<'a, H, X, D, const Q: usize> TransactionEngine<'a, H, X, D, Q>
where
    H: I2cHardware,
    X: Context,
    D: DmaChannel,
{
    /// Create an engine over `hw`, clocked from `channel`.
    ///
    /// This is a const function suitable for static initialization.
    pub const fn new(
        hw: H,
        context: &'a X,
        channel: ClockChannel,
        binding: TransferBinding<'a, D>,
    ) -> Self {
        Self {
            hw,
            context,
            channel,
            binding,
            queue: RingBuffer::filled(None),
            state: AtomicU8::new(0),
            ten_bit: AtomicBool::new(false),
            header_resent: AtomicBool::new(false),
            config: CriticalSectionCell::new(None),
            event_irq: AtomicU16::new(NO_INTERRUPT),
            error_irq: AtomicU16::new(NO_INTERRUPT),
        }
    }

    /// Hardware strategy
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Program bus timing and address width; returns the achieved SCL speed.
    ///
    /// The configuration is kept and re-applied on clock changes.
    pub fn configure_master(&self, config: &I2cConfig) -> ConfigResult<u32> {
        let achieved = self.apply_timing(config)?;
        self.ten_bit.store(
            config.address_mode == AddressMode::TenBit,
            Ordering::Relaxed,
        );
        self.config.with(|slot| *slot = Some(*config));

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "I2C master: requested {} Hz, achieved {} Hz",
            config.max_speed,
            achieved
        );

        Ok(achieved)
    }

    fn apply_timing(&self, config: &I2cConfig) -> ConfigResult<u32> {
        let clock = self.context.frequency(self.channel);
        if clock == 0 {
            return Err(ConfigError::ClockUnavailable);
        }
        self.hw.set_timing(clock, config)
    }

    /// Point the bound DMA channels at the data registers.
    pub fn configure_dma(&self) {
        let (tx_address, rx_address) = self.hw.data_register_addresses();
        self.binding.configure(tx_address, rx_address);
    }

    /// Enable the event and error interrupt sources and unmask their lines.
    ///
    /// Both may be the same line.
    pub fn configure_interrupts(
        &self,
        event: Option<&dyn InterruptLine>,
        error: Option<&dyn InterruptLine>,
    ) {
        self.event_irq.store(
            event.map_or(NO_INTERRUPT, |line| line.index()),
            Ordering::Relaxed,
        );
        self.error_irq.store(
            error.map_or(NO_INTERRUPT, |line| line.index()),
            Ordering::Relaxed,
        );
        self.hw.set_interrupts(event.is_some(), error.is_some());
        for line in [event, error].into_iter().flatten() {
            line.enable();
        }
    }

    // -------------------------------------------------------------------------
    // Queue
    // -------------------------------------------------------------------------

    /// Current protocol state
    pub fn state(&self) -> EngineState {
        EngineState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state.to_raw(), Ordering::Release);
    }

    /// No transaction in flight
    pub fn is_idle(&self) -> bool {
        self.state() == EngineState::Idle
    }

    /// Transactions queued, including the one in flight
    pub fn queued(&self) -> usize {
        self.queue.used()
    }

    /// Queue `transaction`, starting it at once if the bus is idle.
    ///
    /// Returns `false` (and queues nothing) if the transaction has no data,
    /// a phase longer than the hardware can count, a phase with no DMA
    /// channel bound, or if the queue is full.
    ///
    /// # Safety
    ///
    /// `transaction` and its buffers must stay valid, and the buffers
    /// untouched, until its completion has been posted.
    pub unsafe fn submit(&self, transaction: &Transaction<'_>) -> bool {
        if let Err(_reason) = self.check(transaction) {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "I2C transaction to {=u16:#x} rejected: {}",
                transaction.address,
                _reason
            );
            return false;
        }

        critical_section::with(|_| {
            if !self.queue.push(Some(TransactionPtr::new(transaction))) {
                #[cfg(feature = "defmt")]
                defmt::warn!("I2C queue full, transaction to {=u16:#x} rejected", transaction.address);
                return false;
            }
            if self.is_idle() {
                self.start_next();
            }
            true
        })
    }

    fn check(&self, transaction: &Transaction<'_>) -> Result<(), &'static str> {
        if transaction.write.is_none() && transaction.read.is_none() {
            return Err("no data");
        }
        if transaction.write_len() > H::MAX_TRANSFER || transaction.read_len() > H::MAX_TRANSFER
        {
            return Err("phase too long");
        }
        if (transaction.write.is_some() && self.binding.write_channel().is_none())
            || (transaction.read.is_some() && self.binding.read_channel().is_none())
        {
            return Err("no DMA channel for phase");
        }
        Ok(())
    }

    fn head(&self) -> Option<&Transaction<'static>> {
        let ptr = self.queue.peek().flatten()?;
        // SAFETY: `submit` keeps the transaction alive until its completion
        // is posted, which happens only after it leaves the queue.
        Some(unsafe { &*ptr.0 })
    }

    // -------------------------------------------------------------------------
    // Sequencing
    // -------------------------------------------------------------------------

    fn start_request(
        &self,
        transaction: &Transaction<'_>,
        direction: Direction,
        count: usize,
        auto_stop: bool,
        restart: bool,
    ) -> StartRequest {
        StartRequest {
            address: transaction.address,
            mode: if self.ten_bit.load(Ordering::Relaxed) {
                AddressMode::TenBit
            } else {
                AddressMode::SevenBit
            },
            direction,
            count,
            auto_stop,
            restart,
        }
    }

    /// Start the head transaction, retiring any that cannot start.
    ///
    /// Powers the peripheral down once the queue is empty.
    fn start_next(&self) {
        while let Some(next) = self.head() {
            if self.begin(next) {
                return;
            }
            #[cfg(feature = "defmt")]
            defmt::warn!("I2C transaction to {=u16:#x}: no DMA channel", next.address);
            self.retire(EventResult::Config(ConfigError::ChannelUnavailable));
        }
        self.hw.set_dma_requests(false);
        self.hw.disable();
    }

    /// Arm the first phase and issue the start; `false` if no DMA channel
    /// took the phase.
    fn begin(&self, transaction: &Transaction<'_>) -> bool {
        let Some((direction, region)) = transaction.first_phase() else {
            return false;
        };
        let armed = match direction {
            Direction::Write => self.binding.start_write(region),
            Direction::Read => self.binding.start_read(region),
        };
        if !armed {
            return false;
        }
        self.header_resent.store(false, Ordering::Relaxed);
        self.hw.enable();
        self.hw.set_dma_requests(true);

        // a write followed by a read keeps the bus for the repeated start
        let auto_stop = transaction.write.is_none() || transaction.read.is_none();
        self.set_state(EngineState::AddressPhase(direction));
        self.hw.start(&self.start_request(
            transaction,
            direction,
            region.len(),
            auto_stop,
            false,
        ));
        true
    }

    fn start_read_phase(&self, transaction: &Transaction<'_>, read: MemoryRegion) -> bool {
        if !self.binding.start_read(read) {
            return false;
        }
        self.header_resent.store(true, Ordering::Relaxed);
        self.set_state(EngineState::AddressPhase(Direction::Read));
        self.hw.start(&self.start_request(
            transaction,
            Direction::Read,
            read.len(),
            true,
            true,
        ));
        true
    }

    fn address_byte(&self, transaction: &Transaction<'_>, direction: Direction) -> u8 {
        if self.ten_bit.load(Ordering::Relaxed) {
            let read = direction == Direction::Read && self.header_resent.load(Ordering::Relaxed);
            I2C_TEN_BIT_HEADER | ((transaction.address >> 7) as u8 & 0x06) | u8::from(read)
        } else {
            (((transaction.address & 0x7F) as u8) << 1) | direction.bit()
        }
    }

    /// Service the peripheral's event and error flags.
    fn on_bus_event(&self) {
        let status = self.hw.status();
        self.hw.clear(&status);

        let Some(head) = self.head() else {
            return;
        };
        if let Some(kind) = status.first_error() {
            self.abort(head, kind);
            return;
        }
        let state = self.state();
        let Some(direction) = state.direction() else {
            return;
        };

        if status.start_sent {
            self.hw.send_address(self.address_byte(head, direction));
        }
        if status.header_sent {
            self.hw.send_address(head.address as u8);
        }
        if status.address_sent {
            let resend_header = self.ten_bit.load(Ordering::Relaxed)
                && direction == Direction::Read
                && !self.header_resent.load(Ordering::Relaxed);
            let single_byte_read =
                !resend_header && direction == Direction::Read && head.read_len() == 1;
            self.hw.acknowledge_address(single_byte_read);
            if resend_header {
                // 10-bit reads address in write mode, then re-send the header
                // with the read bit after a repeated start
                self.header_resent.store(true, Ordering::Relaxed);
                self.hw.start(&self.start_request(
                    head,
                    Direction::Read,
                    head.read_len(),
                    true,
                    true,
                ));
                return;
            }
            self.set_state(EngineState::DataPhase(direction));
            return;
        }

        let write_finished = status.transfer_complete
            || (status.byte_finished && state == EngineState::DataPhase(Direction::Write));
        if write_finished && direction == Direction::Write {
            match head.read {
                Some(read) => {
                    if !self.start_read_phase(head, read) {
                        // the bus is still held after the write phase
                        self.hw.stop();
                        self.abandon(head, ConfigError::ChannelUnavailable);
                    }
                    return;
                }
                None if status.byte_finished => {
                    // no STOPF in F4 master mode: the write ends here
                    self.hw.stop();
                    self.finish(EventResult::Success);
                    return;
                }
                None => {}
            }
        }

        if status.stop_detected {
            self.finish(EventResult::Success);
        }
    }

    /// Read-DMA completion.
    ///
    /// Ends the read phase on parts without a hardware byte counter. Call from
    /// the DMA stream's interrupt handler.
    pub fn on_dma_read_complete(&self) {
        if !H::STOP_ON_READ_DMA_COMPLETE
            || self.state() != EngineState::DataPhase(Direction::Read)
        {
            return;
        }
        let Some(head) = self.head() else {
            return;
        };
        // a single-byte read had its stop programmed with the address phase
        if head.read_len() > 1 {
            self.hw.stop();
        }
        self.finish(EventResult::Success);
    }

    #[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
    fn abort(&self, transaction: &Transaction<'_>, kind: BusError) {
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "I2C transaction to {=u16:#x} aborted: {}",
            transaction.address,
            kind
        );

        if kind == BusError::AcknowledgeFailure {
            self.hw.stop();
        }
        // an aborted stream stays enabled and would ignore re-arming
        self.binding.disable(Part::Both);
        self.hw.disable();
        self.finish(EventResult::Bus(kind));
    }

    #[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
    fn abandon(&self, transaction: &Transaction<'_>, kind: ConfigError) {
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "I2C transaction to {=u16:#x} abandoned: {}",
            transaction.address,
            kind
        );

        self.binding.disable(Part::Both);
        self.hw.disable();
        self.finish(EventResult::Config(kind));
    }

    /// Pop the head transaction and post its completion.
    fn retire(&self, result: EventResult) {
        let finished = self.queue.pop().flatten();
        self.set_state(EngineState::Idle);
        if let Some(ptr) = finished {
            // SAFETY: still valid until the completion below is posted.
            let done = unsafe { (*ptr.0).done };
            self.context.post(done, result);
        }
    }

    /// Retire the head transaction and start the next one.
    fn finish(&self, result: EventResult) {
        self.retire(result);
        self.start_next();
    }
}

impl<H, X, D, const Q: usize> InterruptHandler for TransactionEngine<'_, H, X, D, Q>
where
    H: I2cHardware,
    X: Context,
    D: DmaChannel,
{
    fn on_interrupt(&self, index: u16) {
        if index == self.event_irq.load(Ordering::Relaxed)
            || index == self.error_irq.load(Ordering::Relaxed)
        {
            self.on_bus_event();
        }
    }
}

impl<H, X, D, const Q: usize> ClockChangeHandler for TransactionEngine<'_, H, X, D, Q>
where
    H: I2cHardware,
    X: Context,
    D: DmaChannel,
{
    fn clock_changed(&self, change: ClockChange) {
        let ClockChange::Changed(_) = change else {
            return;
        };
        let Some(config) = self.config.with_ref(|slot| *slot) else {
            return;
        };
        if let Err(_e) = self.apply_timing(&config) {
            #[cfg(feature = "defmt")]
            defmt::warn!("I2C timing not re-derived after clock change: {}", _e);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
