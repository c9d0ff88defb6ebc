//! # coopvisor
//!
//! **Coopvisor** provides cooperative concurrency primitives for single-threaded,
//! event-loop style hosts.
//!
//! It keeps long-running work from starving the host's execution thread and lets new
//! requests supersede stale ones without explicit unsubscribe plumbing. The crate is
//! designed as a building block for UI front-ends, language-server style services and
//! anything else that answers a stream of "latest input wins" requests.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   user input ──► Generations::step("search")     (every older tracker goes stale)
//!                        │
//!                        ▼ tracker("search")
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Cooperator (time-sliced runs)                                    │
//! │  - visits one element at a time, yields after the slice budget    │
//! │  - handler may suspend and resume later                           │
//! │  - stale tracker ─► stop silently, completion never fires         │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ per-element requests                             │
//!        ▼                                                  │
//! ┌────────────────────────────┐   Transport   ┌─────────────────────┐
//! │ MessageBus (this context)  │ ◄───────────► │ MessageBus (peer)   │
//! │ - callback ids             │   Envelope    │ - topic handlers    │
//! │ - one-shot responders      │               │ - auto-reply        │
//! └─────────────┬──────────────┘               └─────────────────────┘
//!               │ Publishes Events: IterationYielded, ResponseDelivered, ...
//!               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                   EventBus (broadcast channel)                    │
//! │                  (capacity: Config::event_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │        Observer        │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                     sub1.on   sub2.on   subN.on
//!                     _event()  _event()  _event()
//! ```
//!
//! ### Run lifecycle
//! ```text
//! for_each(items, opts, handler, done)
//!
//! pass {
//!   ├─► tracker done?            ─► Cancelled (done dropped)
//!   ├─► elapsed > slice budget?  ─► publish IterationYielded, defer next pass
//!   ├─► handler(key, value, step)
//!   │       ├─ Flow::Continue    ─► next element
//!   │       ├─ Flow::Break       ─► done(Broken{ key })
//!   │       └─ step.suspend()    ─► Suspended until resume()/resume_sync()/finish()
//!   └─► no elements left         ─► done(Exhausted)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Generations**   | Named counters and snapshot trackers for "latest wins" cancel.   | [`Generations`], [`Tracker`]                |
//! | **Iteration**     | Time-sliced, suspendable iteration over sequences and maps.      | [`Cooperator`], [`Step`], [`Resume`]        |
//! | **Messaging**     | Labeled request/reply with correlated one-shot responses.        | [`MessageBus`], [`Transport`]               |
//! | **Subscriber API**| Hook into diagnostic events (logging, metrics, custom).          | [`Subscribe`], [`Observer`]                 |
//! | **Errors**        | Typed errors for bus and transport failures.                     | [`BusError`], [`TransportError`]            |
//! | **Configuration** | Centralize slice budget and queue sizes.                         | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use coopvisor::{Config, Cooperator, Flow, Generations, IterOptions, ManualScheduler};
//!
//! let generations = Generations::new();
//! let sched = ManualScheduler::new();
//! let coop = Cooperator::new(&Config::default(), sched.clone());
//!
//! // A new keystroke supersedes the previous search.
//! let stale = generations.tracker("search");
//! generations.step("search");
//! let fresh = generations.tracker("search");
//!
//! let results = Rc::new(RefCell::new(Vec::new()));
//! for (tag, tracker) in [("stale", stale), ("fresh", fresh)] {
//!     let out = results.clone();
//!     coop.for_each(
//!         vec![1, 2, 3],
//!         IterOptions::new().track(tracker),
//!         |_key, _value, _step| Flow::Continue,
//!         move |_how| out.borrow_mut().push(tag),
//!     );
//! }
//! sched.run_until_idle();
//! assert_eq!(*results.borrow(), vec!["fresh"]);
//! ```
mod config;
mod error;
mod events;
mod generation;
mod iterate;
mod messaging;
mod subscribers;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_SLICE_BUDGET};
pub use error::{BusError, TransportError};
pub use events::{Event, EventBus, EventKind};
pub use generation::{Generations, Tracker, is_done};
pub use iterate::{
    Clock, Collection, Completed, Completion, Cooperator, Flow, IterOptions, Job, Key,
    ManualClock, ManualScheduler, Resume, RunHandle, RunStatus, Scheduler, Step, SystemClock,
    TokioScheduler,
};
pub use messaging::{
    CallbackId, ChannelTransport, Envelope, Inbound, Label, MessageBus, Transport,
};
pub use subscribers::{Observer, Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
