//! Buffered serial stream
//!
//! [`BufferedStream`] turns a [`LineDriver`] into a byte stream with one
//! [`RingBuffer`] per direction. Each ring has exactly one producer and one
//! consumer context:
//!
//! | Ring | Producer | Consumer |
//! |------|----------|----------|
//! | transmit | foreground `write` | write-DMA completion, TXE interrupt, or foreground (polled) |
//! | receive  | circular read DMA (published on idle/DMA completion), RXNE interrupt, or foreground (polled) | foreground `read`, or the interrupt serving a pending read |
//!
//! The receive ring has two consumers over time, but never at once: the
//! interrupt side only drains it while a [`PendingRead`] is recorded, and the
//! foreground clears the pending read before draining.
//!
//! Foreground code takes a short critical section where it touches state the
//! interrupt side also touches (starting the next DMA chunk, arming an
//! interrupt, publishing DMA data, recording a pending read). Interrupt
//! handlers never lock, except to post a completion.

use core::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

use super::binding::TransferBinding;
use super::config::{Part, SerialInterrupt};
use super::error::SerialError;
use super::line::{LineDriver, SerialHandler};
use crate::constants::{DEFAULT_RX_BUFFER, DEFAULT_TX_BUFFER};
use crate::hal::clock::{ClockChange, ClockChangeHandler, ClockChannel};
use crate::hal::dma::{DmaChannel, MemoryRegion};
use crate::hal::interrupt::{InterruptHandler, InterruptLine};
use crate::register::{RegisterAccess, UsartLayout};
use crate::ring::RingBuffer;
use crate::sync::{Completion, Context, CriticalSectionCell, EventResult};

/// Interrupt index meaning "no interrupt line configured"
const NO_INTERRUPT: u16 = u16::MAX;

/// How data moves in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataPath {
    /// DMA channel bound for the direction
    Dma,
    /// Word-at-a-time from the peripheral interrupt
    Interrupt,
    /// Busy-polled from the foreground
    Polled,
}

/// Outstanding non-blocking read.
///
/// Points into the caller's buffer; see [`BufferedStream::read_deferred`].
struct PendingRead {
    data: *mut u8,
    remaining: usize,
    done: &'static Completion,
}

/// Advance of the receive position between two observations of a
/// free-running DMA countdown over a `size`-byte buffer.
///
/// # Panics
///
/// If either count exceeds `size`, or the delta is not in `[0, size)`. Both
/// mean an observation was missed and received data has been lost.
pub fn receive_delta(previous: usize, current: usize, size: usize) -> usize {
    assert!(
        previous <= size && current <= size,
        "DMA count out of range: previous {previous}, current {current}, size {size}"
    );
    let delta = if previous >= current {
        previous - current
    } else {
        previous + size - current
    };
    assert!(delta < size, "receive delta {delta} outside [0, {size})");
    delta
}

// =============================================================================
// Buffered Stream
// =============================================================================

/// Interrupt/DMA-driven byte stream over a USART.
///
/// # Type Parameters
/// * `R` - Register access for the USART block
/// * `V` - USART register layout
/// * `X` - Runtime [`Context`] (clock queries, completion posting, idle wait)
/// * `D` - DMA channel type
/// * `TX` - Transmit ring size in bytes
/// * `RX` - Receive ring size in bytes; also the circular DMA buffer
///
/// # Example
///
/// ```ignore
/// static STREAM: BufferedStream<'static, Mmio, UsartF7, Ctx, Stream, 256, 256> =
///     BufferedStream::new(
///         unsafe { Mmio::new(0x4000_4400) },
///         &CONTEXT,
///         ClockChannel::Apb1,
///         TransferBinding::new(Some(&DMA1_S6), Some(&DMA1_S5)),
///     );
///
/// STREAM.line().configure(&SerialConfig::new())?;
/// STREAM.start(Some(&USART2_IRQ));
/// STREAM.write(b"hello\r\n");
/// ```
pub struct BufferedStream<
    'a,
    R,
    V,
    X,
    D,
    const TX: usize = DEFAULT_TX_BUFFER,
    const RX: usize = DEFAULT_RX_BUFFER,
> {
    line: LineDriver<R, V, &'a X>,
    binding: TransferBinding<'a, D>,
    context: &'a X,
    tx: RingBuffer<u8, TX>,
    rx: RingBuffer<u8, RX>,
    /// Bytes handed to the write DMA and not yet released from `tx`
    tx_in_flight: AtomicUsize,
    /// Read-DMA remaining count at the last observation
    rx_last_remaining: AtomicUsize,
    pending: CriticalSectionCell<Option<PendingRead>>,
    interrupt: AtomicU16,
}

impl<'a, R, V, X, D, const TX: usize, const RX: usize> BufferedStream<'a, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    /// Create a stream over the USART at `regs`, clocked from `channel`.
    ///
    /// This is a const function suitable for static initialization.
    pub const fn new(
        regs: R,
        context: &'a X,
        channel: ClockChannel,
        binding: TransferBinding<'a, D>,
    ) -> Self {
        Self {
            line: LineDriver::new(regs, context, channel),
            binding,
            context,
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
            tx_in_flight: AtomicUsize::new(0),
            rx_last_remaining: AtomicUsize::new(RX),
            pending: CriticalSectionCell::new(None),
            interrupt: AtomicU16::new(NO_INTERRUPT),
        }
    }

    /// Underlying line driver (speed, frame shape, flow control)
    pub fn line(&self) -> &LineDriver<R, V, &'a X> {
        &self.line
    }

    /// Path used for transmitted data
    pub fn transmit_path(&self) -> DataPath {
        self.path(Part::Write)
    }

    /// Path used for received data
    pub fn receive_path(&self) -> DataPath {
        self.path(Part::Read)
    }

    fn path(&self, part: Part) -> DataPath {
        if self.binding.has(part) {
            DataPath::Dma
        } else if self.interrupt.load(Ordering::Relaxed) != NO_INTERRUPT {
            DataPath::Interrupt
        } else {
            DataPath::Polled
        }
    }

    /// Wire DMA and interrupts, enable the line and start receiving.
    ///
    /// Configure the line first. With a read channel, reception runs as a
    /// circular DMA into the receive ring and is published on idle-line and
    /// DMA completion; without one it is interrupt-driven (RXNE) if
    /// `interrupt` is given, otherwise polled.
    pub fn start(&self, interrupt: Option<&dyn InterruptLine>) {
        let (tx_address, rx_address) = self.line.data_register_addresses();
        self.binding.configure(tx_address, rx_address);
        self.line
            .set_dma_requests(Part::Write, self.binding.has(Part::Write));
        self.line
            .set_dma_requests(Part::Read, self.binding.has(Part::Read));
        self.interrupt.store(
            interrupt.map_or(NO_INTERRUPT, |line| line.index()),
            Ordering::Relaxed,
        );
        self.line.enable(Part::Both);

        match self.receive_path() {
            DataPath::Dma => {
                self.rx_last_remaining.store(RX, Ordering::Relaxed);
                self.binding
                    .start_read_circular(self.rx.storage_region());
                self.line
                    .enable_interrupt(SerialInterrupt::Idle, interrupt.is_some());
            }
            DataPath::Interrupt => self
                .line
                .enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true),
            DataPath::Polled => {}
        }

        if let Some(line) = interrupt {
            self.line.enable_interrupt(SerialInterrupt::Error, true);
            self.line.enable_interrupt(SerialInterrupt::Parity, true);
            line.enable();
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "stream started: transmit {}, receive {}",
            self.transmit_path(),
            self.receive_path()
        );
    }

    // -------------------------------------------------------------------------
    // Transmit
    // -------------------------------------------------------------------------

    /// Queue `data` for transmission; returns the number of bytes accepted.
    ///
    /// Never blocks (except on the polled path, which sends synchronously).
    /// Bytes that do not fit in the transmit ring are not taken.
    pub fn write(&self, data: &[u8]) -> usize {
        let accepted = self.tx.write(data);
        if accepted < data.len() {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "transmit ring full: {} of {} bytes accepted",
                accepted,
                data.len()
            );
        }
        self.kick_write();
        accepted
    }

    /// Bytes queued or in flight
    pub fn pending_write(&self) -> usize {
        self.tx.used()
    }

    /// Wait until everything queued has left the line.
    pub fn flush(&self) {
        if self.transmit_path() != DataPath::Polled {
            while self.pending_write() > 0 {
                self.context.wait_for_interrupt();
            }
        }
        self.line.wait_transmit_complete();
    }

    fn kick_write(&self) {
        match self.transmit_path() {
            DataPath::Dma => critical_section::with(|_| self.start_write_dma()),
            DataPath::Interrupt => critical_section::with(|_| {
                self.line
                    .enable_interrupt(SerialInterrupt::TransmitEmpty, true);
            }),
            DataPath::Polled => self.write_polled(),
        }
    }

    /// Hand the longest contiguous queued run to the write DMA, unless a
    /// chunk is already in flight.
    fn start_write_dma(&self) {
        if self.tx_in_flight.load(Ordering::Acquire) != 0 {
            return;
        }
        let run = self.tx.contiguous_run();
        if run.is_empty() {
            return;
        }
        self.tx_in_flight.store(run.len(), Ordering::Release);
        self.line.clear_transmit_complete();
        self.binding
            .start_write(MemoryRegion::from_raw(run.as_ptr() as usize, run.len()));
    }

    fn write_polled(&self) {
        while let Some(byte) = self.tx.pop() {
            self.line.wait_transmit_empty();
            self.line.write(u16::from(byte));
        }
    }

    /// Write-DMA completion: release the sent chunk and start the next one.
    ///
    /// Call from the DMA stream's interrupt handler. Calls made before the
    /// channel reports the whole chunk moved (half-transfer) are ignored.
    pub fn on_dma_write_complete(&self) {
        if !self.binding.write_complete() {
            return;
        }
        let sent = self.tx_in_flight.swap(0, Ordering::AcqRel);
        self.tx.skip(sent);
        self.start_write_dma();
    }

    // -------------------------------------------------------------------------
    // Receive
    // -------------------------------------------------------------------------

    /// Bytes received and not yet read
    pub fn available(&self) -> usize {
        self.poll();
        self.rx.used()
    }

    /// Remaining length of the outstanding non-blocking read, if any
    pub fn pending_read(&self) -> Option<usize> {
        self.pending.with_ref(|slot| slot.as_ref().map(|p| p.remaining))
    }

    /// Read exactly `buf.len()` bytes, sleeping in the context's idle wait
    /// until they have arrived.
    ///
    /// Supersedes any outstanding non-blocking read.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.pending.with(|slot| *slot = None);

        let mut filled = 0;
        loop {
            self.poll();
            filled += self.rx.read(&mut buf[filled..]);
            if filled == buf.len() {
                return filled;
            }
            self.wait_for_data();
        }
    }

    /// Read at least one byte (blocking), returning what is available.
    fn read_some(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.pending.with(|slot| *slot = None);
        loop {
            self.poll();
            let count = self.rx.read(buf);
            if count > 0 {
                return count;
            }
            self.wait_for_data();
        }
    }

    /// Non-blocking read.
    ///
    /// If `buf.len()` bytes are buffered they are copied out and the full
    /// count is returned. Otherwise whatever is buffered is copied, the rest
    /// is recorded as the pending read and 0 is returned; `done` is posted
    /// with [`EventResult::Success`] once the buffer has been filled. Line
    /// errors seen meanwhile are posted to `done` too, without ending the
    /// read.
    ///
    /// A later read (of either kind) supersedes a pending one; its `done` is
    /// then never posted with success.
    ///
    /// # Safety
    ///
    /// `buf` stays borrowed by the stream after this call returns 0: it must
    /// remain valid, and must not be accessed, until `done` has been posted
    /// with success or the read has been superseded.
    pub unsafe fn read_deferred(&self, buf: &mut [u8], done: &'static Completion) -> usize {
        critical_section::with(|_| {
            self.pending.with(|slot| *slot = None);
            if self.receive_path() == DataPath::Dma {
                self.sync_receive();
            }

            if self.rx.used() >= buf.len() {
                return self.rx.read(buf);
            }

            let taken = self.rx.read(buf);
            let rest = &mut buf[taken..];
            self.pending.with(|slot| {
                *slot = Some(PendingRead {
                    data: rest.as_mut_ptr(),
                    remaining: rest.len(),
                    done,
                });
            });
            if self.receive_path() == DataPath::Interrupt {
                self.line
                    .enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);
            }
            0
        })
    }

    /// Pull in whatever the receive path has delivered.
    ///
    /// Needed only on the polled path, or to observe DMA data before the next
    /// idle-line interrupt; the read and query methods call it themselves.
    pub fn poll(&self) {
        match self.receive_path() {
            DataPath::Dma => critical_section::with(|_| self.sync_receive()),
            DataPath::Interrupt => critical_section::with(|_| {
                if !self.rx.is_full()
                    && !self
                        .line
                        .is_interrupt_enabled(SerialInterrupt::ReceiveNotEmpty)
                {
                    self.line
                        .enable_interrupt(SerialInterrupt::ReceiveNotEmpty, true);
                }
            }),
            DataPath::Polled => self.receive_polled(),
        }
    }

    fn receive_polled(&self) {
        while !self.rx.is_full() && self.line.status().rx_not_empty {
            let _ = self.rx.push(self.line.read() as u8);
        }
        self.service_pending();
    }

    fn wait_for_data(&self) {
        if self.receive_path() == DataPath::Polled {
            core::hint::spin_loop();
        } else {
            self.context.wait_for_interrupt();
        }
    }

    /// Publish bytes the circular read DMA has deposited since the last
    /// observation.
    ///
    /// # Panics
    ///
    /// If the DMA has overwritten unread data.
    fn sync_receive(&self) {
        let Some(remaining) = self.binding.read_remaining() else {
            return;
        };
        let previous = self.rx_last_remaining.load(Ordering::Relaxed);
        let delta = receive_delta(previous, remaining, RX);
        if delta == 0 {
            return;
        }
        let committed = self.rx.commit(delta);
        assert!(
            committed,
            "receive ring overrun: {delta} bytes arrived with {} free",
            self.rx.free()
        );
        self.rx_last_remaining.store(remaining, Ordering::Relaxed);
        self.service_pending();
    }

    /// Move buffered bytes into the pending read; post its completion once
    /// it is full.
    fn service_pending(&self) {
        let finished = self.pending.with(|slot| {
            let pending = slot.as_mut()?;
            // SAFETY: `read_deferred`'s contract keeps the destination valid
            // and unaliased while it is recorded here.
            let out = unsafe { core::slice::from_raw_parts_mut(pending.data, pending.remaining) };
            let count = self.rx.read(out);
            pending.data = pending.data.wrapping_add(count);
            pending.remaining -= count;
            if pending.remaining > 0 {
                return None;
            }
            slot.take().map(|p| p.done)
        });
        if let Some(done) = finished {
            self.context.post(done, EventResult::Success);
        }
    }

    /// Read-DMA completion (buffer wrapped).
    ///
    /// Call from the DMA stream's interrupt handler.
    pub fn on_dma_read_complete(&self) {
        self.sync_receive();
    }
}

// =============================================================================
// Interrupt plumbing
// =============================================================================

impl<R, V, X, D, const TX: usize, const RX: usize> SerialHandler
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn error(&self, kind: SerialError) {
        if let Some(done) = self.pending.with_ref(|slot| slot.as_ref().map(|p| p.done)) {
            self.context.post(done, EventResult::Serial(kind));
        }
    }

    fn data_received(&self, data: u16) -> bool {
        if !self.rx.push(data as u8) {
            #[cfg(feature = "defmt")]
            defmt::warn!("receive ring full, byte dropped");
        }
        self.service_pending();
        !self.rx.is_full()
    }

    fn transmit_ready(&self) -> Option<u16> {
        self.tx.pop().map(u16::from)
    }

    fn idle(&self) {
        if self.receive_path() == DataPath::Dma {
            self.sync_receive();
        }
    }
}

impl<R, V, X, D, const TX: usize, const RX: usize> InterruptHandler
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn on_interrupt(&self, index: u16) {
        if index == self.interrupt.load(Ordering::Relaxed) {
            self.line.on_interrupt(self);
        }
    }
}

impl<R, V, X, D, const TX: usize, const RX: usize> ClockChangeHandler
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn clock_changed(&self, change: ClockChange) {
        self.line.clock_changed(change);
    }
}

// =============================================================================
// embedded-io
// =============================================================================

impl<R, V, X, D, const TX: usize, const RX: usize> embedded_io::ErrorType
    for BufferedStream<'_, R, V, X, D, TX, RX>
{
    type Error = SerialError;
}

impl<R, V, X, D, const TX: usize, const RX: usize> embedded_io::Read
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.read_some(buf))
    }
}

impl<R, V, X, D, const TX: usize, const RX: usize> embedded_io::ReadReady
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.available() > 0)
    }
}

impl<R, V, X, D, const TX: usize, const RX: usize> embedded_io::Write
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let accepted = BufferedStream::write(self, buf);
            if accepted > 0 {
                return Ok(accepted);
            }
            self.context.wait_for_interrupt();
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        BufferedStream::flush(self);
        Ok(())
    }
}

impl<R, V, X, D, const TX: usize, const RX: usize> embedded_io::WriteReady
    for BufferedStream<'_, R, V, X, D, TX, RX>
where
    R: RegisterAccess,
    V: UsartLayout,
    X: Context,
    D: DmaChannel,
{
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.tx.is_full())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
