//! Synchronization and Completion Support
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!   - [`AtomicWaker`] - Async waker storage for interrupts (`async` feature)
//!
//! - **Events** (`event`): Completion posting
//!   - [`Completion`] - Caller-owned result slot
//!   - [`Context`] - Clock queries, posting and low-power wait
//!   - [`SystemContext`] - Stock context with an [`EventQueue`]
//!
//! # Example
//!
//! ```ignore
//! use ph_stm32_xfer::sync::{Completion, SystemContext};
//!
//! static CONTEXT: SystemContext<FixedClocks, 128> =
//!     SystemContext::new(FixedClocks::uniform(16_000_000), cortex_m::asm::wfi);
//! static READ_DONE: Completion = Completion::new();
//!
//! let n = unsafe { STREAM.read_deferred(&mut BUF, &READ_DONE) };
//! if n == 0 {
//!     let result = READ_DONE.wait().await;
//! }
//! ```

mod event;
mod primitives;

pub use event::{Completion, Context, EventQueue, EventResult, SystemContext};
#[cfg(feature = "async")]
pub use primitives::AtomicWaker;
pub use primitives::CriticalSectionCell;
