//! Hardware Abstraction Layer
//!
//! Interfaces to the collaborators the drivers consume but do not own.
//!
//! # Modules
//!
//! - [`clock`]: Clock frequency queries and change notifications
//! - [`dma`]: DMA channels and memory regions
//! - [`interrupt`]: Interrupt lines and handlers

pub mod clock;
pub mod dma;
pub mod interrupt;

// Re-export commonly used types
pub use clock::{ClockChange, ClockChangeHandler, ClockChannel, ClockProvider, FixedClocks};
pub use dma::{Burst, DataWidth, DmaChannel, DmaDirection, DmaEnd, MemoryRegion};
pub use interrupt::{InterruptHandler, InterruptLine};
