//! # Generation registry: named, monotonically increasing counters.
//!
//! ```text
//! Generations
//!   └─ RwLock<HashMap<channel, Arc<Channel>>>
//!                                 ├─ live: AtomicU64        (only `step` writes it)
//!                                 └─ tokens: Mutex<HashMap<dependency ids, CancellationToken>>
//! ```
//!
//! ## Rules
//! - A channel is created lazily at generation 0 on first reference
//! - Generations only ever increase; channels are never removed
//! - Trackers hold the channel `Arc`, so `is_done` is one atomic load (no map lookup)
//! - Between two steps a channel keeps at most one token per dependency set; callers get
//!   child tokens, which unregister themselves when dropped

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};

use tokio_util::sync::CancellationToken;

use super::tracker::Tracker;
use crate::events::{self, Event, EventBus, EventKind};

/// Process-wide default registry.
static GLOBAL: OnceLock<Generations> = OnceLock::new();

/// Identity of channels across registries.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(0);

/// Sorted ids of every channel a token depends on.
type DependencyKey = Vec<u64>;

/// Live state of one named channel.
pub(crate) struct Channel {
    id: u64,
    name: Arc<str>,
    live: AtomicU64,
    /// Tokens of the live generation; all cancelled and cleared on `advance`.
    tokens: Mutex<HashMap<DependencyKey, CancellationToken>>,
}

impl Channel {
    fn new(name: &str) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            live: AtomicU64::new(0),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub(crate) fn live(&self) -> u64 {
        self.live.load(Ordering::Acquire)
    }

    fn lock_tokens(&self) -> MutexGuard<'_, HashMap<DependencyKey, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Increments the live generation and cancels every token issued for the old one.
    fn advance(&self) -> u64 {
        let (now, stale) = {
            let mut tokens = self.lock_tokens();
            let now = self.live.fetch_add(1, Ordering::AcqRel) + 1;
            (now, std::mem::take(&mut *tokens))
        };
        for token in stale.into_values() {
            token.cancel();
        }
        now
    }

    /// Returns a token cancelled once any `(channel, start)` pair goes stale.
    ///
    /// `deps` must be sorted by channel id without duplicates. The token comes back
    /// cancelled if a pair is already stale.
    pub(crate) fn link(deps: &[(&Channel, u64)]) -> CancellationToken {
        // Locked in id order; `advance` only ever holds its own lock.
        let mut guards: Vec<_> = deps.iter().map(|(c, _)| c.lock_tokens()).collect();
        if deps.iter().any(|(c, start)| c.live() > *start) {
            let token = CancellationToken::new();
            token.cancel();
            return token;
        }

        let key: DependencyKey = deps.iter().map(|(c, _)| c.id).collect();
        // A member that stepped cancelled this entry; the others still hold it until replaced.
        let shared = match guards.first().and_then(|g| g.get(&key)) {
            Some(t) if !t.is_cancelled() => t.clone(),
            _ => CancellationToken::new(),
        };
        for guard in &mut guards {
            guard.insert(key.clone(), shared.clone());
        }
        shared.child_token()
    }

    #[cfg(test)]
    pub(crate) fn token_sets(&self) -> usize {
        self.lock_tokens().len()
    }
}

/// Registry of generation counters keyed by channel name.
///
/// Cheap to clone (shared `Arc` state). Each test may build its own registry;
/// [`Generations::global`] returns the process-wide default instance.
#[derive(Clone, Default)]
pub struct Generations {
    channels: Arc<RwLock<HashMap<String, Arc<Channel>>>>,
    events: Option<EventBus>,
}

impl Generations {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that publishes `ChannelStepped` events.
    pub fn with_events(bus: EventBus) -> Self {
        Self {
            channels: Arc::default(),
            events: Some(bus),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Generations {
        GLOBAL.get_or_init(Generations::new)
    }

    /// Returns a tracker snapshotting the channel's current generation.
    pub fn tracker(&self, channel: &str) -> Tracker {
        self.tracker_with(channel, Vec::new())
    }

    /// Returns a tracker that is also done when any of `conditions` is done.
    pub fn tracker_with(&self, channel: &str, conditions: Vec<Tracker>) -> Tracker {
        let chan = self.channel(channel);
        let start = chan.live();
        Tracker::new(self.clone(), chan, start, conditions)
    }

    /// Returns the live generation of `channel` (creating it at 0 if unknown).
    pub fn current(&self, channel: &str) -> u64 {
        self.channel(channel).live()
    }

    /// Increments the generation of `channel`, cancelling every tracker issued before.
    ///
    /// Returns the new live generation.
    pub fn step(&self, channel: &str) -> u64 {
        let chan = self.channel(channel);
        self.advance(&chan)
    }

    /// Returns a sorted snapshot of the known channel names.
    pub fn channels(&self) -> Vec<String> {
        let channels = self.channels.read().unwrap_or_else(|p| p.into_inner());
        let mut names: Vec<String> = channels.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn advance(&self, chan: &Channel) -> u64 {
        let now = chan.advance();
        events::emit(self.events.as_ref(), || {
            Event::new(EventKind::ChannelStepped)
                .with_channel(Arc::clone(chan.name()))
                .with_generation(now)
        });
        now
    }

    /// Looks up a channel, creating it on first reference.
    fn channel(&self, name: &str) -> Arc<Channel> {
        if let Some(chan) = self
            .channels
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
        {
            return Arc::clone(chan);
        }
        let mut channels = self.channels.write().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            channels
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Channel::new(name))),
        )
    }
}

impl std::fmt::Debug for Generations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generations")
            .field("channels", &self.channels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_start_at_zero_and_only_grow() {
        let gens = Generations::new();
        assert_eq!(gens.current("search"), 0);
        assert_eq!(gens.step("search"), 1);
        assert_eq!(gens.step("search"), 2);
        assert_eq!(gens.current("search"), 2);
        assert_eq!(gens.current("other"), 0);
        assert_eq!(gens.channels(), vec!["other".to_string(), "search".to_string()]);
    }

    #[test]
    fn registries_are_isolated() {
        let a = Generations::new();
        let b = Generations::new();
        a.step("search");
        assert_eq!(a.current("search"), 1);
        assert_eq!(b.current("search"), 0);
    }

    #[test]
    fn clones_share_state() {
        let a = Generations::new();
        let b = a.clone();
        a.step("x");
        assert_eq!(b.current("x"), 1);
    }

    #[test]
    fn global_registry_is_shared() {
        let before = Generations::global().current("registry-global-test");
        Generations::global().step("registry-global-test");
        assert_eq!(
            Generations::global().current("registry-global-test"),
            before + 1
        );
    }

    #[test]
    fn step_publishes_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let gens = Generations::with_events(bus);

        gens.step("search");

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::ChannelStepped);
        assert_eq!(ev.channel.as_deref(), Some("search"));
        assert_eq!(ev.generation, Some(1));
    }
}
