//! Completion posting and the runtime context.
//!
//! Drivers report asynchronous results by posting a caller-owned
//! [`Completion`] through a [`Context`]. The context is an explicit object
//! handed to each driver at construction; it also answers clock queries and
//! supplies the low-power wait used by blocking reads.
//!
//! [`SystemContext`] is the stock implementation: posted completions are
//! queued in an [`EventQueue`] for the foreground loop to drain. Any
//! interrupt may post, so the push runs inside a critical section. That is
//! the only lock taken from interrupt context on the posting path.

#[cfg(feature = "async")]
use super::primitives::AtomicWaker;
use super::primitives::CriticalSectionCell;
use crate::constants::DEFAULT_EVENT_QUEUE_DEPTH;
use crate::driver::error::{BusError, ConfigError, Error, SerialError};
use crate::hal::clock::{ClockChannel, ClockProvider};
use crate::ring::RingBuffer;

// =============================================================================
// Event Result
// =============================================================================

/// Outcome carried by a posted [`Completion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventResult {
    /// Operation finished
    Success,
    /// Serial line error observed while a read was pending
    Serial(SerialError),
    /// Bus transaction aborted
    Bus(BusError),
    /// Transfer could not be started
    Config(ConfigError),
}

impl EventResult {
    /// True for [`EventResult::Success`]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, EventResult::Success)
    }

    /// Convert to a `Result`
    pub fn into_result(self) -> crate::Result<()> {
        match self {
            EventResult::Success => Ok(()),
            EventResult::Serial(e) => Err(Error::Serial(e)),
            EventResult::Bus(e) => Err(Error::Bus(e)),
            EventResult::Config(e) => Err(Error::Config(e)),
        }
    }
}

// =============================================================================
// Completion
// =============================================================================

/// Caller-owned completion handle.
///
/// Holds the most recently posted result until it is taken. Usually declared
/// `static` next to the buffer it guards.
pub struct Completion {
    result: CriticalSectionCell<Option<EventResult>>,
    #[cfg(feature = "async")]
    waker: AtomicWaker,
}

impl Completion {
    /// Create an unposted handle (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            result: CriticalSectionCell::new(None),
            #[cfg(feature = "async")]
            waker: AtomicWaker::new(),
        }
    }

    /// Record `result`, replacing any unread one, and wake a waiting task.
    pub fn signal(&self, result: EventResult) {
        self.result.with(|slot| *slot = Some(result));
        #[cfg(feature = "async")]
        self.waker.wake();
    }

    /// Take the posted result, leaving the handle unposted.
    pub fn take(&self) -> Option<EventResult> {
        self.result.with(Option::take)
    }

    /// Posted result, if any, without consuming it.
    pub fn peek(&self) -> Option<EventResult> {
        self.result.with_ref(|slot| *slot)
    }

    /// True once a result has been posted and not yet taken
    pub fn is_posted(&self) -> bool {
        self.peek().is_some()
    }

    /// Wait for the next posted result.
    #[cfg(feature = "async")]
    pub async fn wait(&self) -> EventResult {
        core::future::poll_fn(|cx| {
            if let Some(result) = self.take() {
                return core::task::Poll::Ready(result);
            }
            self.waker.register(cx.waker());
            // Re-check after registering so a post in between is not lost.
            match self.take() {
                Some(result) => core::task::Poll::Ready(result),
                None => core::task::Poll::Pending,
            }
        })
        .await
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Completion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion")
            .field("result", &self.peek())
            .finish()
    }
}

// =============================================================================
// Context
// =============================================================================

/// Runtime services a driver needs from its surroundings.
pub trait Context: ClockProvider {
    /// Publish `result` on `completion`. Callable from any interrupt.
    fn post(&self, completion: &'static Completion, result: EventResult);

    /// Sleep until the next interrupt (WFI on Cortex-M).
    fn wait_for_interrupt(&self);
}

impl<T: Context + ?Sized> Context for &T {
    fn post(&self, completion: &'static Completion, result: EventResult) {
        (**self).post(completion, result);
    }

    fn wait_for_interrupt(&self) {
        (**self).wait_for_interrupt();
    }
}

// =============================================================================
// Event Queue
// =============================================================================

/// Bounded queue of posted completions.
///
/// Many producers (any interrupt, serialized by a critical section), one
/// consumer (the foreground loop).
pub struct EventQueue<const N: usize> {
    ring: RingBuffer<Option<&'static Completion>, N>,
}

impl<const N: usize> EventQueue<N> {
    /// Create an empty queue (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            ring: RingBuffer::filled(None),
        }
    }

    /// Signal `completion` and queue it for the foreground.
    ///
    /// Returns `false` if the queue was full. The completion still holds its
    /// result in that case; only the notification is dropped.
    pub fn post(&self, completion: &'static Completion, result: EventResult) -> bool {
        critical_section::with(|_| {
            completion.signal(result);
            let queued = self.ring.push(Some(completion));
            if !queued {
                #[cfg(feature = "defmt")]
                defmt::warn!("event queue full, dropping notification");
            }
            queued
        })
    }

    /// Oldest queued completion (foreground only).
    pub fn pop(&self) -> Option<&'static Completion> {
        self.ring.pop().flatten()
    }

    /// Number of queued notifications
    pub fn len(&self) -> usize {
        self.ring.used()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// System Context
// =============================================================================

/// Stock [`Context`]: a clock provider, an event queue and an idle hook.
///
/// ```ignore
/// static CONTEXT: SystemContext<FixedClocks, 128> =
///     SystemContext::new(FixedClocks::uniform(16_000_000), cortex_m::asm::wfi);
///
/// loop {
///     let done = CONTEXT.wait_for_event();
///     handle(done.take());
/// }
/// ```
pub struct SystemContext<C, const N: usize = DEFAULT_EVENT_QUEUE_DEPTH> {
    clocks: C,
    events: EventQueue<N>,
    idle: fn(),
}

impl<C: ClockProvider, const N: usize> SystemContext<C, N> {
    /// Create a context; `idle` is called whenever a blocking wait yields.
    pub const fn new(clocks: C, idle: fn()) -> Self {
        Self {
            clocks,
            events: EventQueue::new(),
            idle,
        }
    }

    /// The clock provider
    pub fn clocks(&self) -> &C {
        &self.clocks
    }

    /// Oldest posted completion, if any.
    pub fn next_event(&self) -> Option<&'static Completion> {
        self.events.pop()
    }

    /// Sleep until a completion is posted and return it.
    pub fn wait_for_event(&self) -> &'static Completion {
        loop {
            if let Some(completion) = self.events.pop() {
                return completion;
            }
            (self.idle)();
        }
    }

    /// Hand every queued completion to `handler`; returns how many.
    pub fn dispatch<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(&'static Completion),
    {
        let mut count = 0;
        while let Some(completion) = self.events.pop() {
            handler(completion);
            count += 1;
        }
        count
    }

    /// Number of queued notifications
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl<C: ClockProvider, const N: usize> ClockProvider for SystemContext<C, N> {
    fn frequency(&self, channel: ClockChannel) -> u32 {
        self.clocks.frequency(channel)
    }
}

impl<C: ClockProvider, const N: usize> Context for SystemContext<C, N> {
    fn post(&self, completion: &'static Completion, result: EventResult) {
        let _ = self.events.post(completion, result);
    }

    fn wait_for_interrupt(&self) {
        (self.idle)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::clock::FixedClocks;

    fn no_idle() {}

    #[test]
    fn default_context_queue_depth() {
        static DONE: Completion = Completion::new();
        let context: SystemContext<FixedClocks> =
            SystemContext::new(FixedClocks::default(), no_idle);
        for _ in 0..DEFAULT_EVENT_QUEUE_DEPTH {
            context.post(&DONE, EventResult::Success);
        }
        assert_eq!(context.pending_events(), 128);

        context.post(&DONE, EventResult::Bus(BusError::Timing));
        assert_eq!(context.pending_events(), 128);
        assert_eq!(DONE.take(), Some(EventResult::Bus(BusError::Timing)));
    }

    #[test]
    fn completion_take_clears() {
        let done = Completion::new();
        assert!(!done.is_posted());

        done.signal(EventResult::Success);
        assert_eq!(done.peek(), Some(EventResult::Success));
        assert_eq!(done.take(), Some(EventResult::Success));
        assert!(!done.is_posted());
    }

    #[test]
    fn completion_keeps_latest_result() {
        let done = Completion::new();
        done.signal(EventResult::Serial(SerialError::Parity));
        done.signal(EventResult::Success);
        assert_eq!(done.take(), Some(EventResult::Success));
    }

    #[test]
    fn event_result_into_result() {
        assert!(EventResult::Success.into_result().is_ok());
        assert_eq!(
            EventResult::Config(ConfigError::ChannelUnavailable).into_result(),
            Err(Error::Config(ConfigError::ChannelUnavailable))
        );
        assert_eq!(
            EventResult::Bus(BusError::AcknowledgeFailure).into_result(),
            Err(Error::Bus(BusError::AcknowledgeFailure))
        );
    }

    #[test]
    fn queue_delivers_in_post_order() {
        static FIRST: Completion = Completion::new();
        static SECOND: Completion = Completion::new();
        let queue: EventQueue<4> = EventQueue::new();

        assert!(queue.post(&FIRST, EventResult::Success));
        assert!(queue.post(&SECOND, EventResult::Bus(BusError::Bus)));
        assert_eq!(queue.len(), 2);

        assert!(core::ptr::eq(queue.pop().unwrap(), &FIRST));
        assert!(core::ptr::eq(queue.pop().unwrap(), &SECOND));
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_still_signals_completion() {
        static DONE: Completion = Completion::new();
        let queue: EventQueue<1> = EventQueue::new();

        assert!(queue.post(&DONE, EventResult::Success));
        assert!(!queue.post(&DONE, EventResult::Bus(BusError::Timing)));
        assert_eq!(DONE.peek(), Some(EventResult::Bus(BusError::Timing)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn system_context_posts_and_dispatches() {
        static A: Completion = Completion::new();
        static B: Completion = Completion::new();
        let context: SystemContext<FixedClocks, 8> =
            SystemContext::new(FixedClocks::uniform(42_000_000), no_idle);

        assert_eq!(context.frequency(ClockChannel::Apb1), 42_000_000);

        context.post(&A, EventResult::Success);
        context.post(&B, EventResult::Success);
        assert_eq!(context.pending_events(), 2);

        let mut seen = 0;
        assert_eq!(context.dispatch(|_| seen += 1), 2);
        assert_eq!(seen, 2);
        assert!(context.next_event().is_none());
    }

    #[test]
    fn wait_for_event_returns_queued() {
        static DONE: Completion = Completion::new();
        let context: SystemContext<FixedClocks, 2> =
            SystemContext::new(FixedClocks::default(), no_idle);
        context.post(&DONE, EventResult::Success);
        assert!(core::ptr::eq(context.wait_for_event(), &DONE));
    }

    #[cfg(feature = "async")]
    #[test]
    fn wait_resolves_after_signal() {
        use crate::testing::CountingWaker;
        use core::future::Future;
        use core::task::{Context as TaskContext, Poll};

        let done = Completion::new();
        let counter = CountingWaker::new();
        let waker = counter.waker();
        let mut cx = TaskContext::from_waker(&waker);
        let mut future = core::pin::pin!(done.wait());

        assert!(future.as_mut().poll(&mut cx).is_pending());
        done.signal(EventResult::Success);
        assert_eq!(counter.count(), 1);
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(EventResult::Success));
    }
}
