//! # Observer: wires the event bus to a subscriber set.
//!
//! ```text
//! EventBus.subscribe() ──► listener task ──► SubscriberSet::emit(&Event)   (fire-and-forget)
//! ```
//!
//! The listener survives lag (skipped events are counted as overflow for every subscriber)
//! and stops when [`Observer::shutdown`] is called.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::events::{Event, EventBus};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Running bridge between an [`EventBus`] and a [`SubscriberSet`].
pub struct Observer {
    listener: JoinHandle<SubscriberSet>,
    stop: CancellationToken,
}

impl Observer {
    /// Spawns the listener task. Must be called inside a tokio runtime.
    pub fn spawn(cfg: &Config, bus: &EventBus, subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let set = SubscriberSet::new(subs, cfg.subscriber_queue_clamped(), bus.clone());
        let mut rx = bus.subscribe();
        let stop = CancellationToken::new();
        let token = stop.clone();

        let listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => {
                            set.emit(&Event::subscriber_overflow("observer", "lagged"));
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            set
        });

        Self { listener, stop }
    }

    /// Stops listening and waits until subscribers have drained their queues.
    ///
    /// Events still buffered in the broadcast channel are forwarded before the listener exits.
    pub async fn shutdown(self) {
        self.stop.cancel();
        if let Ok(set) = self.listener.await {
            set.shutdown().await;
        }
    }
}
