//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and built-in plumbing for handling
//! diagnostic events broadcast through the [`EventBus`](crate::EventBus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Cooperator / MessageBus / Generations ── publish(Event) ──► EventBus
//!                                                                  │
//!                                                     Observer (listener task)
//!                                                                  │
//!                                                            SubscriberSet
//!                                                     ┌────────────┼────────────┐
//!                                                     ▼            ▼            ▼
//!                                                 LogWriter     Metrics      Custom
//! ```

mod log;
mod observer;
mod set;
mod subscribe;

#[cfg_attr(not(feature = "logging"), allow(unused_imports))]
pub use log::LogWriter;
pub use observer::Observer;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
