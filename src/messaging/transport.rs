//! # Transport seam under the message bus.
//!
//! A transport connects two execution contexts. It only has to:
//! - accept one inbound handler and call it for every message that arrives;
//! - hand outbound messages to the peer.
//!
//! Ordering, loss, and retries are entirely the transport's business; the bus assumes
//! best-effort, at-most-once delivery.

use std::rc::Rc;

use super::envelope::Envelope;
use crate::error::TransportError;

/// Callback invoked for each inbound message.
pub type Inbound = Box<dyn FnMut(Envelope)>;

pub trait Transport {
    /// Installs the inbound handler, replacing any previous one.
    fn register_inbound(&self, handler: Inbound);

    /// Hands one message to the peer.
    fn send_outbound(&self, msg: Envelope) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn register_inbound(&self, handler: Inbound) {
        (**self).register_inbound(handler)
    }

    fn send_outbound(&self, msg: Envelope) -> Result<(), TransportError> {
        (**self).send_outbound(msg)
    }
}
