//! # One driven iteration: the run state machine.
//!
//! ```text
//!            ┌──────────── budget exceeded: on_yield, defer(drive) ─────────┐
//!            ▼                                                              │
//!   start ─► Running ── handler(key, value, step) ── Flow::Continue ────────┤
//!            │   │                                                          │
//!            │   ├── step.suspend() ─► Suspended ── resume()       ─► defer(drive)
//!            │   │                               ├─ resume_sync()  ─► drive now
//!            │   │                               └─ finish()       ─► Finished (Broken)
//!            │   └── Flow::Break ─────────────────────────────────────► Finished (Broken)
//!            ├── cursor == len ──────────────────────────────────────► Finished (Exhausted)
//!            └── tracker done (before each element / before completion) ─► Cancelled
//! ```
//!
//! ## Rules
//! - The cursor only moves forward, so elements are visited in order across yields
//! - The completion callback fires at most once; `Cancelled` drops it unfired
//! - A resume token used while its handler is still on the stack is recorded and
//!   applied when the handler returns (the driver is never re-entered)

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use super::clock::Clock;
use super::collection::Key;
use super::scheduler::Scheduler;
use crate::events::{self, Event, EventBus, EventKind};
use crate::generation::{Tracker, is_done};

/// What the element handler wants the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Visit the next element (ignored if the handler suspended).
    Continue,
    /// Stop now and fire completion.
    Break,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every element was visited.
    Exhausted,
    /// The handler for `key` asked to break.
    Broken { key: Key },
}

/// Observable phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Visiting elements, or waiting for a scheduled slice.
    Running,
    /// Waiting on a [`Resume`] token.
    Suspended,
    /// Completion fired.
    Finished,
    /// Tracker went stale; completion dropped.
    Cancelled,
}

impl RunStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::Cancelled)
    }
}

pub(crate) type Handler<V> = Box<dyn FnMut(&Key, &V, Step) -> Flow>;
pub(crate) type Done = Box<dyn FnOnce(Completion)>;
pub(crate) type Hook = Box<dyn FnMut()>;

#[derive(Debug, Clone, Copy)]
enum Wake {
    Resume,
    ResumeSync,
    Finish,
}

/// What the driver does once a handler returned.
enum After {
    Next,
    NextResync,
    Park,
    Defer,
    Finish,
}

/// Type-erased access to a run, shared by [`Step`], [`Resume`] and [`RunHandle`].
trait RunCore {
    fn wake(self: Rc<Self>, wake: Wake);
    fn mark_suspended(&self);
    fn is_stale(&self) -> bool;
    fn status(&self) -> RunStatus;
    fn visited(&self) -> usize;
    fn len(&self) -> usize;
}

struct State<V> {
    entries: Rc<[(Key, V)]>,
    cursor: usize,
    status: RunStatus,
    handler: Option<Handler<V>>,
    done: Option<Done>,
    on_yield: Option<Hook>,
    in_handler: bool,
    suspend_requested: bool,
    pending: Option<Wake>,
    scheduled: bool,
}

/// Immutable run parameters.
pub(crate) struct RunParams {
    pub(crate) tracker: Option<Tracker>,
    pub(crate) budget: Option<Duration>,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) events: Option<EventBus>,
}

pub(crate) struct Run<V> {
    state: RefCell<State<V>>,
    params: RunParams,
}

impl<V: 'static> Run<V> {
    pub(crate) fn start(
        entries: Vec<(Key, V)>,
        handler: Handler<V>,
        done: Done,
        on_yield: Option<Hook>,
        params: RunParams,
    ) -> RunHandle {
        let run = Rc::new(Run {
            state: RefCell::new(State {
                entries: entries.into(),
                cursor: 0,
                status: RunStatus::Running,
                handler: Some(handler),
                done: Some(done),
                on_yield,
                in_handler: false,
                suspend_requested: false,
                pending: None,
                scheduled: false,
            }),
            params,
        });
        run.drive();
        RunHandle { core: run }
    }

    /// One synchronous pass: visits elements until the slice ends, the run parks, or it finishes.
    fn drive(self: &Rc<Self>) {
        let mut pass_start = self.params.clock.now();
        let mut visited_in_pass = 0usize;
        loop {
            let (entries, index, mut handler) = {
                let mut st = self.state.borrow_mut();
                if st.status != RunStatus::Running || st.in_handler {
                    return;
                }
                if is_done(self.params.tracker.as_ref()) {
                    drop(st);
                    self.cancel();
                    return;
                }
                if st.cursor >= st.entries.len() {
                    break;
                }
                // Every pass visits at least one element, whatever the budget.
                let over_budget = visited_in_pass > 0
                    && self
                        .params
                        .budget
                        .is_some_and(|b| self.params.clock.now().saturating_sub(pass_start) > b);
                if over_budget {
                    let key = st.entries[st.cursor].0.clone();
                    drop(st);
                    self.emit(EventKind::IterationYielded, Some(&key), None);
                    self.notify_yield();
                    self.schedule();
                    return;
                }
                let Some(handler) = st.handler.take() else {
                    return;
                };
                st.in_handler = true;
                st.suspend_requested = false;
                (Rc::clone(&st.entries), st.cursor, handler)
            };

            let (key, value) = &entries[index];
            let core: Rc<dyn RunCore> = self.clone();
            let flow = handler(key, value, Step { core });
            visited_in_pass += 1;

            let after = {
                let mut st = self.state.borrow_mut();
                st.handler = Some(handler);
                st.in_handler = false;
                st.cursor = index + 1;
                let pending = st.pending.take();
                if flow == Flow::Break {
                    After::Finish
                } else if !st.suspend_requested {
                    After::Next
                } else {
                    match pending {
                        None => {
                            st.status = RunStatus::Suspended;
                            After::Park
                        }
                        Some(Wake::Resume) => After::Defer,
                        Some(Wake::ResumeSync) => After::NextResync,
                        Some(Wake::Finish) => After::Finish,
                    }
                }
            };

            match after {
                After::Next => {}
                After::NextResync => {
                    pass_start = self.params.clock.now();
                    visited_in_pass = 0;
                }
                After::Park => return,
                After::Defer => {
                    self.schedule();
                    return;
                }
                After::Finish => {
                    self.complete(Completion::Broken { key: key.clone() });
                    return;
                }
            }
        }
        self.complete(Completion::Exhausted);
    }

    /// Fires completion once, unless the tracker went stale in the meantime.
    fn complete(self: &Rc<Self>, how: Completion) {
        if is_done(self.params.tracker.as_ref()) {
            self.cancel();
            return;
        }
        let (done, handler, hook) = {
            let mut st = self.state.borrow_mut();
            assert!(
                st.status != RunStatus::Finished,
                "iteration completion fired twice"
            );
            if st.status == RunStatus::Cancelled {
                return;
            }
            st.status = RunStatus::Finished;
            (st.done.take(), st.handler.take(), st.on_yield.take())
        };
        drop((handler, hook));

        let (reason, key) = match &how {
            Completion::Exhausted => ("exhausted", None),
            Completion::Broken { key } => ("break", Some(key)),
        };
        self.emit(EventKind::IterationCompleted, key, Some(reason));
        if let Some(done) = done {
            done(how);
        }
    }

    /// Moves to `Cancelled` and drops the completion callback unfired.
    fn cancel(&self) {
        let dropped = {
            let mut st = self.state.borrow_mut();
            if st.status.is_terminal() {
                return;
            }
            st.status = RunStatus::Cancelled;
            (st.done.take(), st.handler.take(), st.on_yield.take())
        };
        drop(dropped);
        self.emit(EventKind::IterationCancelled, None, None);
    }

    /// Queues one more pass on the host scheduler (at most one pending at a time).
    fn schedule(self: &Rc<Self>) {
        {
            let mut st = self.state.borrow_mut();
            if st.scheduled {
                return;
            }
            st.scheduled = true;
        }
        let me = Rc::clone(self);
        self.params.scheduler.defer(Box::new(move || {
            me.state.borrow_mut().scheduled = false;
            me.drive();
        }));
    }

    /// Tells the caller's enclosing layer that this run introduced asynchrony.
    fn notify_yield(&self) {
        let hook = self.state.borrow_mut().on_yield.take();
        if let Some(mut hook) = hook {
            hook();
            let mut st = self.state.borrow_mut();
            if !st.status.is_terminal() && st.on_yield.is_none() {
                st.on_yield = Some(hook);
            }
        }
    }

    fn emit(&self, kind: EventKind, key: Option<&Key>, reason: Option<&'static str>) {
        events::emit(self.params.events.as_ref(), || {
            let mut ev = Event::new(kind);
            if let Some(t) = &self.params.tracker {
                ev = ev.with_channel(t.title()).with_generation(t.start());
            }
            if let Some(key) = key {
                ev = ev.with_key(key.to_string());
            }
            if let Some(reason) = reason {
                ev = ev.with_reason(reason);
            }
            ev
        });
    }
}

impl<V: 'static> RunCore for Run<V> {
    fn wake(self: Rc<Self>, wake: Wake) {
        {
            let mut st = self.state.borrow_mut();
            let status = st.status;
            match status {
                RunStatus::Finished | RunStatus::Cancelled => return,
                RunStatus::Running => {
                    // Only the token of the handler currently on the stack can still be live.
                    if st.in_handler && st.suspend_requested && st.pending.is_none() {
                        st.pending = Some(wake);
                        drop(st);
                        self.emit(EventKind::IterationResumed, None, None);
                    }
                    return;
                }
                RunStatus::Suspended => st.status = RunStatus::Running,
            }
        }
        self.emit(EventKind::IterationResumed, None, None);
        match wake {
            Wake::Resume => self.schedule(),
            Wake::ResumeSync => self.drive(),
            Wake::Finish => {
                let key = {
                    let st = self.state.borrow();
                    st.entries[st.cursor - 1].0.clone()
                };
                self.complete(Completion::Broken { key });
            }
        }
    }

    fn mark_suspended(&self) {
        let key = {
            let mut st = self.state.borrow_mut();
            if !st.in_handler {
                return;
            }
            st.suspend_requested = true;
            st.entries[st.cursor].0.clone()
        };
        self.emit(EventKind::IterationSuspended, Some(&key), None);
        self.notify_yield();
    }

    fn is_stale(&self) -> bool {
        is_done(self.params.tracker.as_ref())
    }

    fn status(&self) -> RunStatus {
        self.state.borrow().status
    }

    fn visited(&self) -> usize {
        self.state.borrow().cursor
    }

    fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }
}

/// Per-element context handed to the handler.
///
/// Dropping it without calling [`suspend`](Self::suspend) lets the driver continue
/// according to the returned [`Flow`].
pub struct Step {
    core: Rc<dyn RunCore>,
}

impl Step {
    /// Yield signal: the run parks after this handler returns, until the token is used.
    ///
    /// Fires the run's `on_yield` hook. Dropping the token without using it leaves the run
    /// suspended for good (completion never fires).
    pub fn suspend(self) -> Resume {
        self.core.mark_suspended();
        Resume { core: self.core }
    }

    /// True once the run's tracker is done; long handlers may bail out early.
    pub fn is_cancelled(&self) -> bool {
        self.core.is_stale()
    }
}

/// One-shot continuation of a suspended run.
#[must_use = "a suspended run only continues through its resume token"]
pub struct Resume {
    core: Rc<dyn RunCore>,
}

impl Resume {
    /// Continues with the next element on a later scheduler turn.
    pub fn resume(self) {
        self.core.wake(Wake::Resume);
    }

    /// Continues with the next element right now, on the caller's stack.
    pub fn resume_sync(self) {
        self.core.wake(Wake::ResumeSync);
    }

    /// Early break: fires completion (unless the run is stale) without visiting more elements.
    pub fn finish(self) {
        self.core.wake(Wake::Finish);
    }
}

/// Observation handle of a run.
#[derive(Clone)]
pub struct RunHandle {
    core: Rc<dyn RunCore>,
}

impl RunHandle {
    pub fn status(&self) -> RunStatus {
        self.core.status()
    }

    /// Number of elements whose handler has returned.
    pub fn visited(&self) -> usize {
        self.core.visited()
    }

    /// Number of elements in the run.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves with the run's completion, or `None` if the run was cancelled or abandoned.
///
/// The future does not keep the run alive: a run parked on a resume token that gets
/// dropped is freed, and the future resolves to `None`.
#[must_use = "futures do nothing unless awaited"]
pub struct Completed {
    rx: oneshot::Receiver<Completion>,
}

impl Completed {
    pub(crate) fn new(rx: oneshot::Receiver<Completion>) -> Self {
        Self { rx }
    }
}

impl Future for Completed {
    type Output = Option<Completion>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}
