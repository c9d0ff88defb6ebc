//! Cooperative, time-sliced iteration.
//!
//! Walks a collection one element at a time on the host's single execution thread,
//! handing control back to the host scheduler whenever a pass runs longer than the
//! slice budget, and stopping silently when its tracker goes stale.
//!
//! ## Contents
//! - [`Cooperator`], [`IterOptions`] start runs
//! - [`Step`], [`Resume`], [`Flow`] handler-side continuation protocol
//! - [`RunHandle`], [`RunStatus`], [`Completion`], [`Completed`] run observation
//! - [`Scheduler`] ([`TokioScheduler`], [`ManualScheduler`]) and [`Clock`]
//!   ([`SystemClock`], [`ManualClock`]) host seams
//! - [`Collection`], [`Key`] input normalization

mod clock;
mod collection;
mod cooperator;
mod run;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Collection, Key};
pub use cooperator::{Cooperator, IterOptions};
pub use run::{Completed, Completion, Flow, Resume, RunHandle, RunStatus, Step};
pub use scheduler::{Job, ManualScheduler, Scheduler, TokioScheduler};
