//! Diagnostic events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the generation registry, iteration runs,
//! and message buses.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`EventBus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Generations::step`, `Cooperator` runs, `MessageBus`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Observer` (fans out to `SubscriberSet`).

mod bus;
mod event;

pub(crate) use bus::emit;
pub use bus::EventBus;
pub use event::{Event, EventKind};
