//! Labeled request/reply messaging between two execution contexts.
//!
//! - [`MessageBus`] assigns callback ids, dispatches inbound messages to topic
//!   handlers, auto-replies, and routes replies to one-shot responders.
//! - [`Transport`] is the seam to whatever actually moves messages;
//!   [`ChannelTransport`] is the in-process implementation.
//! - [`Envelope`], [`Label`], [`CallbackId`] describe the wire shape.

mod bus;
mod channel;
mod envelope;
mod transport;

pub use bus::MessageBus;
pub use channel::ChannelTransport;
pub use envelope::{CallbackId, Envelope, Label};
pub use transport::{Inbound, Transport};
