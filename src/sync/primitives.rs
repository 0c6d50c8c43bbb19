//! Synchronization primitives for ISR-safe access.
//!
//! Short critical sections guard the few cross-context slots that cannot be
//! split into single-producer/single-consumer halves: the pending-read slot of
//! a buffered stream, the result slot of a [`Completion`](super::Completion)
//! and its waker.

use core::cell::RefCell;
#[cfg(feature = "async")]
use core::task::Waker;
use critical_section::Mutex;

/// Cell providing interior mutability under a critical section.
///
/// Every access masks interrupts for the duration of the closure, so keep the
/// closures to a handful of loads and stores.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access to the value.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Run `f` with shared access to the value.
    #[inline]
    pub fn with_ref<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| f(&self.inner.borrow_ref(cs)))
    }
}

// SAFETY: all access goes through a critical section.
unsafe impl<T> Sync for CriticalSectionCell<T> {}

/// Interrupt-safe waker slot.
///
/// Futures register from `poll`; interrupt handlers wake.
#[cfg(feature = "async")]
pub struct AtomicWaker {
    waker: CriticalSectionCell<Option<Waker>>,
}

#[cfg(feature = "async")]
impl AtomicWaker {
    /// Create an empty slot (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            waker: CriticalSectionCell::new(None),
        }
    }

    /// Store `waker`, unless an equivalent one is already registered.
    pub fn register(&self, waker: &Waker) {
        self.waker.with(|slot| {
            if !slot.as_ref().is_some_and(|w| w.will_wake(waker)) {
                *slot = Some(waker.clone());
            }
        });
    }

    /// Take and wake the registered waker, if any.
    #[inline]
    pub fn wake(&self) {
        if let Some(waker) = self.waker.with(Option::take) {
            waker.wake();
        }
    }

    /// True while a waker is stored
    pub fn is_registered(&self) -> bool {
        self.waker.with_ref(Option::is_some)
    }
}

#[cfg(feature = "async")]
impl Default for AtomicWaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_with_mutates() {
        let cell = CriticalSectionCell::new(0u32);
        cell.with(|v| *v += 10);
        assert_eq!(cell.with_ref(|v| *v), 10);
    }

    #[test]
    fn cell_as_static_option_slot() {
        static SLOT: CriticalSectionCell<Option<u16>> = CriticalSectionCell::new(None);
        SLOT.with(|v| *v = Some(7));
        assert_eq!(SLOT.with(Option::take), Some(7));
        assert_eq!(SLOT.with_ref(|v| *v), None);
    }

    #[test]
    fn cell_nested_in_other_critical_section() {
        let cell = CriticalSectionCell::new(1u8);
        let value = critical_section::with(|_| cell.with(|v| *v));
        assert_eq!(value, 1);
    }

    #[cfg(feature = "async")]
    #[test]
    fn waker_register_then_wake_once() {
        use crate::testing::CountingWaker;

        let slot = AtomicWaker::new();
        let counter = CountingWaker::new();
        slot.register(&counter.waker());
        assert!(slot.is_registered());

        slot.wake();
        slot.wake();
        assert_eq!(counter.count(), 1);
        assert!(!slot.is_registered());
    }

    #[cfg(feature = "async")]
    #[test]
    fn waker_register_replaces_previous() {
        use crate::testing::CountingWaker;

        let slot = AtomicWaker::new();
        let first = CountingWaker::new();
        let second = CountingWaker::new();
        slot.register(&first.waker());
        slot.register(&second.waker());
        slot.wake();

        assert_eq!(first.count(), 0);
        assert_eq!(second.count(), 1);
    }
}
