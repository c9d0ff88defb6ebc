//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Events are published from inside element and message handlers, so [`SubscriberSet::emit`]
//! must never wait. Each subscriber gets its own bounded queue and worker task; a full
//! queue drops the event for that subscriber only and reports how far behind it is.
//!
//! ```text
//! emit(event) ──try_send──► [queue: capacity from Subscribe / Config] ──► worker ──► on_event()
//!                  │ full/closed                                           │ panic
//!                  ▼                                                       ▼
//!   SubscriberOverflow "full queue=N dropped=K"               SubscriberPanicked "<message>"
//! ```
//!
//! `AssertUnwindSafe` is used around `on_event`; a subscriber that panics while holding a
//! lock may leave its own state poisoned.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{Event, EventBus};
use crate::subscribers::Subscribe;

/// Sending side of one subscriber's queue.
struct Queue {
    name: &'static str,
    capacity: usize,
    dropped: AtomicU64,
    sender: mpsc::Sender<Arc<Event>>,
}

impl Queue {
    /// Counts a dropped event and describes the queue state for the overflow event.
    fn overflow_reason(&self, cause: &str) -> String {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{cause} queue={} dropped={dropped}", self.capacity)
    }
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: EventBus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// `default_capacity` (normally `Config::subscriber_queue`) applies to subscribers that
    /// return `None` from [`Subscribe::queue_capacity`]. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, default_capacity: usize, bus: EventBus) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let capacity = sub.queue_capacity().unwrap_or(default_capacity).max(1);
            let (sender, rx) = mpsc::channel::<Arc<Event>>(capacity);
            queues.push(Queue {
                name: sub.name(),
                capacity,
                dropped: AtomicU64::new(0),
                sender,
            });
            workers.push(tokio::spawn(drive(sub, rx, bus.clone())));
        }
        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queues an event for every subscriber without waiting.
    ///
    /// An overflow event that itself overflows is dropped without a further report.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        for queue in &self.queues {
            let cause = match queue.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            let reason = queue.overflow_reason(cause);
            if !event.is_subscriber_overflow() {
                self.bus
                    .publish(Event::subscriber_overflow(queue.name, reason));
            }
        }
    }

    /// Closes every queue and waits until the workers have handled what was queued.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Worker loop of one subscriber: handles events in order, reporting panics on the bus.
async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: EventBus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*payload)));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
