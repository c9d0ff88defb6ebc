//! # Diagnostic events emitted by the cooperative primitives.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Generation events**: a channel advanced to a new generation
//! - **Iteration events**: yield, suspend, resume, and terminal states of a run
//! - **Messaging events**: outbound/inbound traffic and reply correlation
//! - **Subscriber events**: overflow and panics in observer workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, channel name,
//! element key, message label, and callback id.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use coopvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ChannelStepped)
//!     .with_channel("search")
//!     .with_generation(3);
//!
//! assert_eq!(ev.kind, EventKind::ChannelStepped);
//! assert_eq!(ev.channel.as_deref(), Some("search"));
//! assert_eq!(ev.generation, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Generation events ===
    /// A channel's live generation was incremented.
    ///
    /// Sets:
    /// - `channel`: channel name
    /// - `generation`: the new live generation
    ChannelStepped,

    // === Iteration events ===
    /// A run exceeded its time slice and handed control back to the scheduler.
    ///
    /// Sets:
    /// - `channel`: tracker title (if the run is tracked)
    /// - `key`: next element to visit
    IterationYielded,

    /// An element handler suspended the run and took a resume token.
    ///
    /// Sets:
    /// - `channel`: tracker title (if tracked)
    /// - `key`: element whose handler suspended
    IterationSuspended,

    /// A suspended run was resumed through its token.
    ///
    /// Sets:
    /// - `channel`: tracker title (if tracked)
    IterationResumed,

    /// A run finished and its completion callback fired.
    ///
    /// Sets:
    /// - `channel`: tracker title (if tracked)
    /// - `key`: element that broke the loop (early break only)
    /// - `reason`: `"exhausted"` or `"break"`
    IterationCompleted,

    /// A run observed a done tracker and stopped without completing.
    ///
    /// Sets:
    /// - `channel`: tracker title
    /// - `generation`: the tracker's start generation
    IterationCancelled,

    // === Messaging events ===
    /// A message was handed to the transport.
    ///
    /// Sets:
    /// - `label`: topic or reply label
    /// - `callback`: correlation id (requests only)
    MessageSent,

    /// An inbound message was dispatched to its handlers.
    ///
    /// Sets:
    /// - `label`: topic or reply label
    /// - `callback`: correlation id carried by the message
    /// - `reason`: number of handlers run
    MessageReceived,

    /// A reply reached its pending responder.
    ///
    /// Sets:
    /// - `callback`: correlation id
    ResponseDelivered,

    /// A reply arrived for a callback id with no pending responder.
    ///
    /// Sets:
    /// - `callback`: correlation id
    ResponseUnbound,

    /// A reply arrived after the tracker of its request went stale; the responder was dropped.
    ///
    /// Sets:
    /// - `callback`: correlation id
    /// - `channel`: tracker title
    /// - `generation`: the tracker's start generation
    ResponseStale,

    /// An automatic reply could not be handed to the transport.
    ///
    /// Sets:
    /// - `label`: reply label
    /// - `callback`: correlation id
    /// - `reason`: error label (e.g., `"transport_closed"`)
    ReplyLost,

    /// A handler was skipped because it was already running (re-entrant delivery).
    ///
    /// Sets:
    /// - `label`: label being dispatched
    HandlerBusy,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: cause and queue state (e.g., `"full queue=16 dropped=3"`, `"lagged"`)
    SubscriberOverflow,
}

/// Diagnostic event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Generation channel name (or tracker title of a tracked run).
    pub channel: Option<Arc<str>>,
    /// Generation number, if applicable.
    pub generation: Option<u64>,
    /// Element key rendered as text.
    pub key: Option<Arc<str>>,
    /// Message label rendered as text.
    pub label: Option<Arc<str>>,
    /// Reply correlation id.
    pub callback: Option<u64>,
    /// Subscriber name (subscriber events only).
    pub subscriber: Option<&'static str>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            channel: None,
            generation: None,
            key: None,
            label: None,
            callback: None,
            subscriber: None,
            reason: None,
        }
    }

    /// Attaches a channel name.
    #[inline]
    pub fn with_channel(mut self, channel: impl Into<Arc<str>>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attaches a generation number.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches an element key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a message label.
    #[inline]
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches a reply correlation id.
    #[inline]
    pub fn with_callback(mut self, id: u64) -> Self {
        self.callback = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: impl Into<Arc<str>>) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::IterationYielded);
        let b = Event::new(EventKind::IterationYielded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_helpers_fill_name_and_reason() {
        let ev = Event::subscriber_overflow("log", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.subscriber, Some("log"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
    }
}
