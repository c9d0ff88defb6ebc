//! Generation-based cancellation.
//!
//! Cancellation by polling: each named channel carries a live generation; a [`Tracker`]
//! remembers the generation it was issued at and is stale once the channel moves on.
//! Stepping a channel implicitly cancels every tracker previously issued for it, which
//! gives "latest request wins" without any unsubscribe or callback chain.
//!
//! ## Contents
//! - [`Generations`] injectable registry of channel counters
//! - [`Tracker`] immutable snapshot token (optionally composed of condition trackers)
//! - [`is_done`] staleness check for an optional tracker

mod registry;
mod tracker;

pub use registry::Generations;
pub use tracker::{Tracker, is_done};
