//! # Tracker: immutable staleness snapshot.
//!
//! A [`Tracker`] records the generation of one channel at creation time, plus an optional
//! list of condition trackers. It is **done** when its channel has been stepped past that
//! generation, or when any condition is done.
//!
//! ```text
//! t1 = gens.tracker("search")      start=0   live=0   done=false
//! t2 = t1.step()                   start=1   live=1   t1 done=true, t2 done=false
//! t3 = gens.tracker_with("rank", vec![t2.clone()])
//! t2.step()                        → t2 done → t3 done (through its condition)
//! ```
//!
//! Conditions must exist before the tracker that depends on them, and trackers are never
//! mutated afterwards, so condition graphs cannot contain cycles.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::registry::{Channel, Generations};

/// Snapshot token used to detect staleness relative to a channel's generation.
#[derive(Clone)]
pub struct Tracker {
    registry: Generations,
    channel: Arc<Channel>,
    start: u64,
    conditions: Arc<[Tracker]>,
}

impl Tracker {
    pub(crate) fn new(
        registry: Generations,
        channel: Arc<Channel>,
        start: u64,
        conditions: Vec<Tracker>,
    ) -> Self {
        Self {
            registry,
            channel,
            start,
            conditions: conditions.into(),
        }
    }

    /// Channel name this tracker snapshots.
    pub fn title(&self) -> &str {
        self.channel.name()
    }

    /// Generation of the channel when this tracker was issued.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Trackers this one transitively depends on.
    pub fn conditions(&self) -> &[Tracker] {
        &self.conditions
    }

    /// Increments the channel's live generation and returns a fresh tracker at the new generation.
    ///
    /// Every tracker previously issued for this channel (including `self`) becomes done.
    /// The returned tracker carries no conditions.
    #[must_use = "the fresh tracker is the only one that is not done"]
    pub fn step(&self) -> Tracker {
        let now = self.registry.advance(&self.channel);
        Tracker::new(
            self.registry.clone(),
            Arc::clone(&self.channel),
            now,
            Vec::new(),
        )
    }

    /// True iff the live generation exceeds `start`, or any condition is done.
    pub fn is_done(&self) -> bool {
        self.channel.live() > self.start || self.conditions.iter().any(Tracker::is_done)
    }

    /// Returns a token that is cancelled once this tracker is done.
    ///
    /// If the tracker is already done the token comes back cancelled. Useful for
    /// `tokio::select!` in async work guarded by a tracker; polling with
    /// [`is_done`](Self::is_done) stays the primary mechanism.
    ///
    /// Trackers with the same channels share one registration per generation; the
    /// returned child token releases its slot when dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        let mut deps: Vec<(&Channel, u64)> = Vec::new();
        self.dependencies(&mut deps);
        // Keep the oldest start per channel: it is the first to go stale.
        deps.sort_by_key(|(c, start)| (c.id(), *start));
        deps.dedup_by_key(|(c, _)| c.id());
        Channel::link(&deps)
    }

    /// Collects `(channel, start)` for this tracker and every condition, recursively.
    fn dependencies<'a>(&'a self, out: &mut Vec<(&'a Channel, u64)>) {
        out.push((self.channel.as_ref(), self.start));
        for condition in self.conditions.iter() {
            condition.dependencies(out);
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("title", &self.title())
            .field("start", &self.start)
            .field("conditions", &self.conditions)
            .finish()
    }
}

/// Staleness check for an optional tracker; `None` is never done.
#[inline]
pub fn is_done(tracker: Option<&Tracker>) -> bool {
    tracker.is_some_and(Tracker::is_done)
}
