//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the cooperative primitives.
//!
//! Config is used in two ways:
//! 1. **Iteration**: `Cooperator::new(&config, scheduler)` takes the time slice budget
//! 2. **Observability**: `EventBus::new(config.event_capacity_clamped())` and subscriber queues
//!
//! ## Sentinel values
//! - `slice_budget = 0s` → time slicing disabled (runs never yield on their own)

use std::time::Duration;

/// Default time slice for one synchronous iteration pass.
pub const DEFAULT_SLICE_BUDGET: Duration = Duration::from_millis(80);

/// Global configuration for the cooperative runtime.
///
/// ## Field semantics
/// - `slice_budget`: Max synchronous work per pass before a forced yield (`0s` = never yield)
/// - `event_capacity`: Diagnostic event bus ring buffer size (min 1)
/// - `subscriber_queue`: Default per-subscriber queue size (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time one synchronous pass may run before yielding to the host scheduler.
    ///
    /// Checked before each element, so a single slow element can overrun it.
    pub slice_budget: Duration,

    /// Capacity of the diagnostic event bus ring buffer.
    pub event_capacity: usize,

    /// Queue capacity used by subscribers that don't override it.
    pub subscriber_queue: usize,
}

impl Config {
    /// Returns the slice budget as an `Option`.
    ///
    /// - `None` → time slicing disabled
    /// - `Some(d)` → yield once a pass has run longer than `d`
    #[inline]
    pub fn budget(&self) -> Option<Duration> {
        if self.slice_budget == Duration::ZERO {
            None
        } else {
            Some(self.slice_budget)
        }
    }

    /// Returns the event capacity clamped to a minimum of 1.
    #[inline]
    pub fn event_capacity_clamped(&self) -> usize {
        self.event_capacity.max(1)
    }

    /// Returns the subscriber queue size clamped to a minimum of 1.
    #[inline]
    pub fn subscriber_queue_clamped(&self) -> usize {
        self.subscriber_queue.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `slice_budget = 80ms`
    /// - `event_capacity = 1024`
    /// - `subscriber_queue = 1024`
    fn default() -> Self {
        Self {
            slice_budget: DEFAULT_SLICE_BUDGET,
            event_capacity: 1024,
            subscriber_queue: 1024,
        }
    }
}
