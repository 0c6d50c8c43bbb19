//! DMA channel binding
//!
//! [`TransferBinding`] pairs a peripheral with an optional transmit channel
//! and an optional receive channel. Which parts are bound decides which data
//! paths a driver runs on DMA and which fall back to interrupts or polling.

use super::config::Part;
use crate::hal::dma::{Burst, DataWidth, DmaChannel, DmaDirection, DmaEnd, MemoryRegion};

/// Optional write and read DMA channels of one peripheral.
pub struct TransferBinding<'a, D> {
    write: Option<&'a D>,
    read: Option<&'a D>,
}

impl<'a, D: DmaChannel> TransferBinding<'a, D> {
    /// Bind the given channels (const, suitable for static initialization).
    pub const fn new(write: Option<&'a D>, read: Option<&'a D>) -> Self {
        Self { write, read }
    }

    /// No DMA at all.
    pub const fn none() -> Self {
        Self {
            write: None,
            read: None,
        }
    }

    /// True if every direction in `part` has a channel
    pub fn has(&self, part: Part) -> bool {
        (!part.includes_write() || self.write.is_some())
            && (!part.includes_read() || self.read.is_some())
    }

    /// Parts with a bound channel, if any
    pub fn bound_parts(&self) -> Option<Part> {
        match (self.write.is_some(), self.read.is_some()) {
            (true, true) => Some(Part::Both),
            (true, false) => Some(Part::Write),
            (false, true) => Some(Part::Read),
            (false, false) => None,
        }
    }

    /// Transmit channel
    pub fn write_channel(&self) -> Option<&'a D> {
        self.write
    }

    /// Receive channel
    pub fn read_channel(&self) -> Option<&'a D> {
        self.read
    }

    /// Program byte-wide single transfers against the peripheral data
    /// registers at `tx_address` and `rx_address`.
    pub fn configure(&self, tx_address: usize, rx_address: usize) {
        if let Some(dma) = self.write {
            dma.configure(DmaDirection::MemoryToPeripheral, DataWidth::Byte, Burst::Single);
            dma.set_address(DmaEnd::Peripheral, tx_address);
            dma.set_circular(false);
        }
        if let Some(dma) = self.read {
            dma.configure(DmaDirection::PeripheralToMemory, DataWidth::Byte, Burst::Single);
            dma.set_address(DmaEnd::Peripheral, rx_address);
        }
    }

    /// Send `region`; returns `false` if no write channel is bound.
    pub fn start_write(&self, region: MemoryRegion) -> bool {
        let Some(dma) = self.write else {
            return false;
        };
        dma.set_memory(region);
        dma.start();
        true
    }

    /// Receive once into `region`; returns `false` if no read channel is bound.
    pub fn start_read(&self, region: MemoryRegion) -> bool {
        let Some(dma) = self.read else {
            return false;
        };
        dma.set_circular(false);
        dma.set_memory(region);
        dma.start();
        true
    }

    /// Receive continuously into `region`, wrapping at its end.
    pub fn start_read_circular(&self, region: MemoryRegion) -> bool {
        let Some(dma) = self.read else {
            return false;
        };
        dma.set_circular(true);
        dma.set_memory(region);
        dma.start();
        true
    }

    /// Stop the channels of `part`, abandoning whatever they were moving.
    ///
    /// Must precede re-arming a channel whose transfer did not run to the end.
    pub fn disable(&self, part: Part) {
        if let Some(dma) = self.write.filter(|_| part.includes_write()) {
            dma.stop();
        }
        if let Some(dma) = self.read.filter(|_| part.includes_read()) {
            dma.stop();
        }
    }

    /// The write channel has moved its whole count (false if none is bound)
    pub fn write_complete(&self) -> bool {
        self.write.is_some_and(DmaChannel::complete)
    }

    /// Remaining count of the read channel
    pub fn read_remaining(&self) -> Option<usize> {
        self.read.map(DmaChannel::current_transfer_count)
    }
}
