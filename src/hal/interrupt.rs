//! Interrupt line interface
//!
//! Vector-table binding stays with the application: its ISR calls
//! [`InterruptHandler::on_interrupt`] on the driver that owns the line.

/// One NVIC interrupt line.
pub trait InterruptLine {
    /// Unmask the line.
    fn enable(&self);

    /// Vector index of the line.
    fn index(&self) -> u16;
}

/// Consumer of peripheral interrupts.
pub trait InterruptHandler {
    /// Service an interrupt raised on line `index`.
    ///
    /// Runs in interrupt context: never blocks.
    fn on_interrupt(&self, index: u16);
}
