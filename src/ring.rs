//! Fixed-capacity single-producer/single-consumer ring buffer.
//!
//! [`RingBuffer`] is the only structure shared between foreground code and
//! interrupt handlers without a lock. Each side owns one position counter:
//!
//! - the producer advances `head` ([`write`](RingBuffer::write),
//!   [`push`](RingBuffer::push), [`commit`](RingBuffer::commit))
//! - the consumer advances `tail` ([`read`](RingBuffer::read),
//!   [`pop`](RingBuffer::pop), [`skip`](RingBuffer::skip))
//!
//! Both counters run modulo `2 * N`, so a full ring and an empty ring are
//! distinguishable without a shared `used` field that both sides would have
//! to update. `used`, `read_index` and `write_index` are derived from them.
//!
//! Correctness depends on exactly one context producing and exactly one
//! context consuming for the lifetime of the buffer.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::hal::dma::MemoryRegion;

/// Fixed-capacity circular buffer of `N` elements.
pub struct RingBuffer<T, const N: usize> {
    storage: UnsafeCell<[T; N]>,
    /// Producer position, modulo `2 * N`
    head: AtomicUsize,
    /// Consumer position, modulo `2 * N`
    tail: AtomicUsize,
}

impl<const N: usize> RingBuffer<u8, N> {
    /// Create an empty byte ring (const, suitable for static initialization).
    #[must_use]
    pub const fn new() -> Self {
        Self::filled(0)
    }
}

impl<const N: usize> Default for RingBuffer<u8, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Create an empty ring whose backing storage is initialized to `fill`.
    #[must_use]
    pub const fn filled(fill: T) -> Self {
        const { assert!(N > 0, "ring capacity must be non-zero") };
        Self {
            storage: UnsafeCell::new([fill; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Capacity in elements
    #[inline(always)]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of produced but unconsumed elements
    #[inline(always)]
    pub fn used(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        Self::distance(tail, head)
    }

    /// Number of free slots
    #[inline(always)]
    pub fn free(&self) -> usize {
        N - self.used()
    }

    /// True when nothing is buffered
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.used() == 0
    }

    /// True when no further element can be produced
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.used() == N
    }

    /// Next slot the consumer reads
    #[inline(always)]
    pub fn read_index(&self) -> usize {
        self.tail.load(Ordering::Acquire) % N
    }

    /// Next slot the producer writes
    #[inline(always)]
    pub fn write_index(&self) -> usize {
        self.head.load(Ordering::Acquire) % N
    }

    // -------------------------------------------------------------------------
    // Producer side
    // -------------------------------------------------------------------------

    /// Append as much of `data` as fits; returns the number of elements taken.
    ///
    /// Never blocks. Excess input is dropped and the caller detects the short
    /// count.
    pub fn write(&self, data: &[T]) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let count = data.len().min(N - Self::distance(tail, head));
        if count == 0 {
            return 0;
        }

        let start = head % N;
        let first = count.min(N - start);
        let base = self.base_ptr();
        // SAFETY: slots [head, head + count) are free, so the consumer is not
        // reading them; both runs stay inside the N-element storage.
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), base.add(start), first);
            core::ptr::copy_nonoverlapping(data.as_ptr().add(first), base, count - first);
        }

        self.head.store(Self::wrap(head + count), Ordering::Release);
        count
    }

    /// Append one element; returns `false` if the ring is full.
    pub fn push(&self, value: T) -> bool {
        self.write(core::slice::from_ref(&value)) == 1
    }

    /// Publish `count` elements that were deposited directly into storage
    /// (by DMA) at the current write position.
    ///
    /// Returns `false` without changing anything if fewer than `count` slots
    /// were free, meaning unread data has been overwritten.
    #[must_use]
    pub fn commit(&self, count: usize) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if count > N - Self::distance(tail, head) {
            return false;
        }
        self.head.store(Self::wrap(head + count), Ordering::Release);
        true
    }

    // -------------------------------------------------------------------------
    // Consumer side
    // -------------------------------------------------------------------------

    /// Copy up to `out.len()` elements out; returns the number copied.
    pub fn read(&self, out: &mut [T]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let count = out.len().min(Self::distance(tail, head));
        if count == 0 {
            return 0;
        }

        let start = tail % N;
        let first = count.min(N - start);
        let base = self.base_ptr();
        // SAFETY: slots [tail, tail + count) have been published by the
        // producer and are not written again until the tail moves past them.
        unsafe {
            core::ptr::copy_nonoverlapping(base.add(start), out.as_mut_ptr(), first);
            core::ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), count - first);
        }

        self.tail.store(Self::wrap(tail + count), Ordering::Release);
        count
    }

    /// Remove and return the oldest element.
    pub fn pop(&self) -> Option<T> {
        let value = self.peek()?;
        self.tail
            .store(Self::wrap(self.tail.load(Ordering::Relaxed) + 1), Ordering::Release);
        Some(value)
    }

    /// Return the oldest element without removing it.
    pub fn peek(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        // SAFETY: the slot at tail is published and owned by the consumer.
        Some(unsafe { *self.base_ptr().add(tail % N) })
    }

    /// Discard up to `count` elements without copying; returns the number skipped.
    pub fn skip(&self, count: usize) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let count = count.min(Self::distance(tail, head));
        self.tail.store(Self::wrap(tail + count), Ordering::Release);
        count
    }

    /// Longest run of unread elements that is contiguous in storage.
    ///
    /// The run starts at the read position and ends at the write position or
    /// the end of storage, whichever comes first. It stays valid until the
    /// consumer advances past it.
    pub fn contiguous_run(&self) -> &[T] {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let start = tail % N;
        let len = Self::distance(tail, head).min(N - start);
        // SAFETY: the run lies inside storage and covers only published slots,
        // which the producer does not touch until they are consumed.
        unsafe { core::slice::from_raw_parts(self.base_ptr().add(start), len) }
    }

    /// Discard everything currently buffered (consumer side).
    pub fn clear(&self) {
        self.tail
            .store(self.head.load(Ordering::Acquire), Ordering::Release);
    }

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------

    /// Backing storage as a DMA memory region.
    ///
    /// Used to run a circular receive DMA directly into the ring; the producer
    /// then publishes deposited elements with [`commit`](Self::commit).
    pub fn storage_region(&self) -> MemoryRegion {
        MemoryRegion::from_raw(self.base_ptr() as usize, N * core::mem::size_of::<T>())
    }

    #[inline(always)]
    fn base_ptr(&self) -> *mut T {
        self.storage.get().cast::<T>()
    }

    #[inline(always)]
    const fn wrap(position: usize) -> usize {
        position % (2 * N)
    }

    #[inline(always)]
    const fn distance(from: usize, to: usize) -> usize {
        (to + 2 * N - from) % (2 * N)
    }
}

// SAFETY: producer and consumer touch disjoint slots and publish them through
// acquire/release counters; callers uphold the one-producer/one-consumer rule.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

// =============================================================================
// Tests
// =============================================================================
