//! In-process transport over tokio channels.
//!
//! Each endpoint owns the receiving half of one unbounded channel and the sending half
//! of its peer's. Messages cross as JSON text, the same shape a cross-context
//! transport would carry.
//!
//! Delivery is pull-based: nothing reaches the inbound handler until the receiving side
//! calls [`ChannelTransport::drain`] or runs [`ChannelTransport::pump`].

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::{Mutex, mpsc};

use super::envelope::Envelope;
use super::transport::{Inbound, Transport};
use crate::error::TransportError;

struct Endpoint {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
    inbound: RefCell<Option<Inbound>>,
}

impl Endpoint {
    fn deliver(&self, text: &str) {
        // Undecodable frames are dropped like any other lost message.
        let Ok(msg) = Envelope::from_json(text) else {
            return;
        };
        // Taken out while running so the handler may send (or re-register) freely.
        let taken = self.inbound.borrow_mut().take();
        if let Some(mut handler) = taken {
            handler(msg);
            let mut slot = self.inbound.borrow_mut();
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }
}

/// One end of an in-process message channel.
#[derive(Clone)]
pub struct ChannelTransport {
    endpoint: Rc<Endpoint>,
}

impl ChannelTransport {
    /// Two connected endpoints: what one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::endpoint(b_tx, a_rx), Self::endpoint(a_tx, b_rx))
    }

    /// A single endpoint connected to itself.
    pub fn loopback() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::endpoint(tx, rx)
    }

    fn endpoint(tx: mpsc::UnboundedSender<String>, rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            endpoint: Rc::new(Endpoint {
                tx,
                rx: Mutex::new(rx),
                inbound: RefCell::new(None),
            }),
        }
    }

    /// Delivers every queued message, including ones queued while delivering.
    ///
    /// Returns the number of frames taken off the channel. A nested call from inside
    /// a handler, or a call while [`pump`](Self::pump) is running, delivers nothing.
    pub fn drain(&self) -> usize {
        let Ok(mut rx) = self.endpoint.rx.try_lock() else {
            return 0;
        };
        let mut n = 0;
        while let Ok(text) = rx.try_recv() {
            self.endpoint.deliver(&text);
            n += 1;
        }
        n
    }

    /// Delivers messages as they arrive until every sender to this endpoint is gone.
    pub async fn pump(&self) {
        let mut rx = self.endpoint.rx.lock().await;
        while let Some(text) = rx.recv().await {
            self.endpoint.deliver(&text);
        }
    }
}

impl Transport for ChannelTransport {
    fn register_inbound(&self, handler: Inbound) {
        *self.endpoint.inbound.borrow_mut() = Some(handler);
    }

    fn send_outbound(&self, msg: Envelope) -> Result<(), TransportError> {
        let text = msg.to_json()?;
        self.endpoint
            .tx
            .send(text)
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Label;
    use serde_json::json;
    use std::cell::RefCell;

    fn recorder(t: &ChannelTransport) -> Rc<RefCell<Vec<Envelope>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        t.register_inbound(Box::new(move |msg| sink.borrow_mut().push(msg)));
        seen
    }

    #[test]
    fn pair_delivers_to_the_peer_only_on_drain() {
        let (a, b) = ChannelTransport::pair();
        let seen_a = recorder(&a);
        let seen_b = recorder(&b);

        a.send_outbound(Envelope::new("x".into(), json!(1), None))
            .unwrap();
        assert!(seen_b.borrow().is_empty());

        assert_eq!(a.drain(), 0);
        assert_eq!(b.drain(), 1);
        assert!(seen_a.borrow().is_empty());
        assert_eq!(seen_b.borrow()[0].label, Label::from("x"));
    }

    #[test]
    fn loopback_drains_messages_sent_from_the_handler() {
        let t = ChannelTransport::loopback();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (sink, echo) = (seen.clone(), t.clone());
        t.register_inbound(Box::new(move |msg: Envelope| {
            if msg.data == json!(0) {
                echo.send_outbound(Envelope::new(msg.label.clone(), json!(1), None))
                    .unwrap();
            }
            sink.borrow_mut().push(msg.data);
        }));

        t.send_outbound(Envelope::new("e".into(), json!(0), None))
            .unwrap();
        assert_eq!(t.drain(), 2);
        assert_eq!(*seen.borrow(), vec![json!(0), json!(1)]);
    }

    #[test]
    fn send_to_dropped_peer_is_closed() {
        let (a, b) = ChannelTransport::pair();
        drop(b);
        let err = a
            .send_outbound(Envelope::new("x".into(), json!(null), None))
            .unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }

    #[test]
    fn undecodable_frames_are_skipped() {
        let t = ChannelTransport::loopback();
        let seen = recorder(&t);
        t.endpoint.tx.send("not json".to_string()).unwrap();
        t.send_outbound(Envelope::new("ok".into(), json!(null), None))
            .unwrap();

        assert_eq!(t.drain(), 2);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn pump_ends_when_peer_is_dropped() {
        let (a, b) = ChannelTransport::pair();
        let seen = recorder(&b);
        a.send_outbound(Envelope::new("x".into(), json!(1), None))
            .unwrap();
        a.send_outbound(Envelope::new("y".into(), json!(2), None))
            .unwrap();
        drop(a);

        b.pump().await;
        assert_eq!(seen.borrow().len(), 2);
    }
}
