//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [stepped] channel=search generation=3
//! [yielded] channel=search key=#812
//! [cancelled] channel=search start=2
//! [completed] channel=search how=exhausted
//! [sent] label=ping callback=1
//! [received] label=ping callback=1 handlers=1
//! [unbound] callback=7
//! [stale-reply] channel=search callback=4 start=Some(2)
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Renders one event as a single line, without the trailing newline.
    pub fn render(e: &Event) -> String {
        let channel = e.channel.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ChannelStepped => {
                format!("[stepped] channel={channel} generation={:?}", e.generation)
            }
            EventKind::IterationYielded => {
                format!("[yielded] channel={channel} key={:?}", e.key)
            }
            EventKind::IterationSuspended => {
                format!("[suspended] channel={channel} key={:?}", e.key)
            }
            EventKind::IterationResumed => format!("[resumed] channel={channel}"),
            EventKind::IterationCompleted => format!(
                "[completed] channel={channel} how={}",
                e.reason.as_deref().unwrap_or("unknown")
            ),
            EventKind::IterationCancelled => {
                format!("[cancelled] channel={channel} start={:?}", e.generation)
            }
            EventKind::MessageSent => {
                format!("[sent] label={:?} callback={:?}", e.label, e.callback)
            }
            EventKind::MessageReceived => format!(
                "[received] label={:?} callback={:?} handlers={}",
                e.label,
                e.callback,
                e.reason.as_deref().unwrap_or("0")
            ),
            EventKind::ResponseDelivered => format!("[delivered] callback={:?}", e.callback),
            EventKind::ResponseUnbound => format!("[unbound] callback={:?}", e.callback),
            EventKind::ResponseStale => format!(
                "[stale-reply] channel={channel} callback={:?} start={:?}",
                e.callback, e.generation
            ),
            EventKind::ReplyLost => format!(
                "[reply-lost] callback={:?} error={}",
                e.callback,
                e.reason.as_deref().unwrap_or("unknown")
            ),
            EventKind::HandlerBusy => format!("[handler-busy] label={:?}", e.label),
            EventKind::SubscriberOverflow => format!(
                "[subscriber-overflow] subscriber={:?} reason={:?}",
                e.subscriber, e.reason
            ),
            EventKind::SubscriberPanicked => format!(
                "[subscriber-panicked] subscriber={} info={}",
                e.subscriber.unwrap_or("unknown"),
                e.reason.as_deref().unwrap_or("unknown"),
            ),
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("{}", Self::render(e));
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_step_and_completion() {
        let ev = Event::new(EventKind::ChannelStepped)
            .with_channel("search")
            .with_generation(3);
        assert_eq!(
            LogWriter::render(&ev),
            "[stepped] channel=search generation=Some(3)"
        );

        let ev = Event::new(EventKind::IterationCompleted).with_reason("break");
        assert_eq!(LogWriter::render(&ev), "[completed] channel=- how=break");
    }
}
