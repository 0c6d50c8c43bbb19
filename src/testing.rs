//! Testing utilities and mock implementations
//!
//! Host-side stand-ins for the register blocks, DMA channels, clocks and
//! runtime context the drivers talk to. Everything records what the driver
//! did so tests can assert on it afterwards.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use std::boxed::Box;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Wake, Waker};
use std::vec::Vec;

use crate::hal::clock::{ClockChannel, ClockProvider, FixedClocks};
use crate::hal::dma::{Burst, DataWidth, DmaChannel, DmaDirection, DmaEnd};
use crate::hal::interrupt::InterruptLine;
use crate::register::RegisterAccess;
use crate::sync::{Completion, Context, EventResult};

/// Bus address the mock register block pretends to live at
pub const MOCK_BASE: usize = 0x4000_0000;

// =============================================================================
// Mock Registers
// =============================================================================

/// Mock register block
///
/// Reads return the stored value unless a value has been queued for that
/// offset, in which case the queue is drained first. Writes store the value
/// and are logged.
///
/// # Example
///
/// ```ignore
/// let regs = MockRegisters::new();
/// regs.set(F7_ISR, STATUS_RXNE);
/// regs.queue_read(F7_RDR, u32::from(b'x'));
///
/// let line: LineDriver<_, UsartF7, _> = LineDriver::new(regs, &clock, ClockChannel::Apb1);
/// ```
#[derive(Debug, Default)]
pub struct MockRegisters {
    /// Current values: offset -> value
    values: RefCell<HashMap<usize, u32>>,
    /// One-shot values returned by the next reads of an offset
    queued: RefCell<HashMap<usize, VecDeque<u32>>>,
    /// Number of reads per offset
    read_counts: RefCell<HashMap<usize, usize>>,
    /// Record of writes: (offset, value)
    write_log: RefCell<Vec<(usize, u32)>>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register value without logging a write
    pub fn set(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
    }

    /// Current value of a register, without counting a read
    pub fn get(&self, offset: usize) -> u32 {
        self.values.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// Make the next read of `offset` return `value` (reads queue up in order)
    pub fn queue_read(&self, offset: usize, value: u32) {
        self.queued
            .borrow_mut()
            .entry(offset)
            .or_default()
            .push_back(value);
    }

    /// Number of reads of `offset` so far
    pub fn reads(&self, offset: usize) -> usize {
        self.read_counts.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// Last value written to `offset`
    pub fn last_write(&self, offset: usize) -> Option<u32> {
        self.write_log
            .borrow()
            .iter()
            .rev()
            .find(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
    }

    /// Every value written to `offset`, oldest first
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.write_log
            .borrow()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// All writes that have been made
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.write_log.borrow().clone()
    }

    /// Clear the write log
    pub fn clear_writes(&self) {
        self.write_log.borrow_mut().clear();
    }
}

impl RegisterAccess for MockRegisters {
    fn read(&self, offset: usize) -> u32 {
        *self.read_counts.borrow_mut().entry(offset).or_default() += 1;
        if let Some(value) = self
            .queued
            .borrow_mut()
            .get_mut(&offset)
            .and_then(VecDeque::pop_front)
        {
            return value;
        }
        self.get(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.write_log.borrow_mut().push((offset, value));
        self.set(offset, value);
    }

    fn address(&self, offset: usize) -> usize {
        MOCK_BASE + offset
    }
}

// =============================================================================
// Mock DMA
// =============================================================================

/// Mock DMA channel
///
/// Memory-to-peripheral transfers copy the programmed memory range when
/// started, so tests can check what would have gone out on the wire.
/// Peripheral-to-memory transfers are driven by [`deposit`](Self::deposit),
/// which writes into the programmed memory and counts down (and reloads, in
/// circular mode) like the hardware remaining-count register.
#[derive(Debug, Default)]
pub struct MockDma {
    direction: Cell<Option<DmaDirection>>,
    peripheral: Cell<usize>,
    memory: Cell<usize>,
    count: Cell<usize>,
    remaining: Cell<usize>,
    circular: Cell<bool>,
    complete: Cell<bool>,
    enabled: Cell<bool>,
    starts: Cell<usize>,
    stops: Cell<usize>,
    /// Address or count writes while the channel was enabled
    live_reprograms: Cell<usize>,
    /// Every byte sent, in order
    sent: RefCell<Vec<u8>>,
    /// Bytes sent per start
    chunks: RefCell<Vec<Vec<u8>>>,
}

impl MockDma {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(&self) -> Option<DmaDirection> {
        self.direction.get()
    }

    pub fn peripheral_address(&self) -> usize {
        self.peripheral.get()
    }

    pub fn memory_address(&self) -> usize {
        self.memory.get()
    }

    pub fn is_circular(&self) -> bool {
        self.circular.get()
    }

    pub fn starts(&self) -> usize {
        self.starts.get()
    }

    pub fn stops(&self) -> usize {
        self.stops.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn live_reprograms(&self) -> usize {
        self.live_reprograms.get()
    }

    pub fn sent(&self) -> Vec<u8> {
        self.sent.borrow().clone()
    }

    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.borrow().clone()
    }

    /// Simulate the peripheral delivering `data` into the programmed memory.
    pub fn deposit(&self, data: &[u8]) {
        for &byte in data {
            assert!(self.remaining.get() > 0, "deposit past the end of a one-shot transfer");
            let position = self.count.get() - self.remaining.get();
            // SAFETY: tests program the memory end with a live buffer of
            // `count` bytes (a ring's storage or a test array).
            unsafe { ((self.memory.get() + position) as *mut u8).write_volatile(byte) };
            self.remaining.set(self.remaining.get() - 1);
            if self.remaining.get() == 0 {
                self.complete.set(true);
                if self.circular.get() {
                    self.remaining.set(self.count.get());
                } else {
                    self.enabled.set(false);
                }
            }
        }
    }

    /// Mark the whole transfer done.
    pub fn finish(&self) {
        self.remaining.set(0);
        self.complete.set(true);
        self.enabled.set(false);
    }
}

impl DmaChannel for MockDma {
    fn configure(&self, direction: DmaDirection, _width: DataWidth, _burst: Burst) {
        self.direction.set(Some(direction));
    }

    fn set_address(&self, end: DmaEnd, address: usize) {
        if self.enabled.get() {
            self.live_reprograms.set(self.live_reprograms.get() + 1);
        }
        match end {
            DmaEnd::Peripheral => self.peripheral.set(address),
            DmaEnd::Memory => self.memory.set(address),
        }
    }

    fn set_transfer_count(&self, count: usize) {
        if self.enabled.get() {
            self.live_reprograms.set(self.live_reprograms.get() + 1);
        }
        self.count.set(count);
        self.remaining.set(count);
    }

    fn start(&self) {
        self.starts.set(self.starts.get() + 1);
        self.enabled.set(true);
        self.complete.set(false);
        self.remaining.set(self.count.get());

        if self.direction.get() == Some(DmaDirection::MemoryToPeripheral) {
            // SAFETY: the driver under test handed over a live region of
            // `count` bytes.
            let chunk = unsafe {
                core::slice::from_raw_parts(self.memory.get() as *const u8, self.count.get())
            }
            .to_vec();
            self.sent.borrow_mut().extend_from_slice(&chunk);
            self.chunks.borrow_mut().push(chunk);
        }
    }

    fn stop(&self) {
        self.stops.set(self.stops.get() + 1);
        self.enabled.set(false);
    }

    fn complete(&self) -> bool {
        self.complete.get()
    }

    fn current_transfer_count(&self) -> usize {
        self.remaining.get()
    }

    fn set_circular(&self, circular: bool) {
        self.circular.set(circular);
    }
}

// =============================================================================
// Mock Clock
// =============================================================================

/// Mock clock provider reporting one frequency for every channel
#[derive(Debug)]
pub struct MockClock {
    hz: Cell<u32>,
}

impl MockClock {
    pub fn new(hz: u32) -> Self {
        Self { hz: Cell::new(hz) }
    }

    pub fn set(&self, hz: u32) {
        self.hz.set(hz);
    }
}

impl ClockProvider for MockClock {
    fn frequency(&self, _channel: ClockChannel) -> u32 {
        self.hz.get()
    }
}

// =============================================================================
// Mock Context
// =============================================================================

/// Mock runtime context
///
/// Clocks run at 16 MHz. Posted results are logged (and signalled on the
/// completion). `wait_for_interrupt` runs the hook installed with
/// [`on_wait`](Self::on_wait), which stands in for the interrupt that would
/// have woken the core; waiting with no hook installed panics instead of
/// hanging the test.
pub struct MockContext<'h> {
    clocks: FixedClocks,
    posts: RefCell<Vec<EventResult>>,
    posted_to: RefCell<Vec<&'static Completion>>,
    waits: Cell<usize>,
    hook: RefCell<Option<Box<dyn FnMut() + 'h>>>,
}

impl<'h> MockContext<'h> {
    pub fn new() -> Self {
        Self {
            clocks: FixedClocks::default(),
            posts: RefCell::new(Vec::new()),
            posted_to: RefCell::new(Vec::new()),
            waits: Cell::new(0),
            hook: RefCell::new(None),
        }
    }

    /// Results posted so far, oldest first
    pub fn posts(&self) -> Vec<EventResult> {
        self.posts.borrow().clone()
    }

    /// Completions posted so far, oldest first
    pub fn posted_to(&self) -> Vec<&'static Completion> {
        self.posted_to.borrow().clone()
    }

    /// Number of idle waits
    pub fn waits(&self) -> usize {
        self.waits.get()
    }

    /// Run `hook` on every idle wait
    pub fn on_wait(&self, hook: impl FnMut() + 'h) {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }
}

impl ClockProvider for MockContext<'_> {
    fn frequency(&self, channel: ClockChannel) -> u32 {
        self.clocks.frequency(channel)
    }
}

impl Context for MockContext<'_> {
    fn post(&self, completion: &'static Completion, result: EventResult) {
        self.posts.borrow_mut().push(result);
        self.posted_to.borrow_mut().push(completion);
        completion.signal(result);
    }

    fn wait_for_interrupt(&self) {
        self.waits.set(self.waits.get() + 1);
        let mut hook = self.hook.borrow_mut();
        match hook.as_mut() {
            Some(hook) => hook(),
            None => panic!("wait_for_interrupt with nothing left to wake the core"),
        }
    }
}

// =============================================================================
// Mock Interrupt Line
// =============================================================================

/// Mock NVIC line
#[derive(Debug)]
pub struct MockInterruptLine {
    index: u16,
    enabled: Cell<bool>,
}

impl MockInterruptLine {
    pub fn new(index: u16) -> Self {
        Self {
            index,
            enabled: Cell::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

impl InterruptLine for MockInterruptLine {
    fn enable(&self) {
        self.enabled.set(true);
    }

    fn index(&self) -> u16 {
        self.index
    }
}

// =============================================================================
// Counting Waker
// =============================================================================

/// Waker that counts how often it was woken
#[derive(Debug, Clone, Default)]
pub struct CountingWaker {
    wakes: Arc<AtomicUsize>,
}

struct CountingWake(Arc<AtomicUsize>);

impl Wake for CountingWake {
    fn wake(self: Arc<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl CountingWaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waker(&self) -> Waker {
        Waker::from(Arc::new(CountingWake(Arc::clone(&self.wakes))))
    }

    pub fn count(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}
