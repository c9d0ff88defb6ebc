//! # Cooperator: starts time-sliced runs.
//!
//! A [`Cooperator`] bundles what every run shares (slice budget, host scheduler, clock,
//! optional event bus). Each call to [`for_each`](Cooperator::for_each) starts one run and
//! drives its first pass synchronously before returning.
//!
//! ## Example
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use coopvisor::{Collection, Config, Cooperator, Flow, IterOptions, ManualScheduler};
//!
//! let sched = ManualScheduler::new();
//! let coop = Cooperator::new(&Config::default(), sched.clone());
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let out = seen.clone();
//! coop.for_each(
//!     Collection::from(vec![10, 20, 30]),
//!     IterOptions::new(),
//!     move |_key, value, _step| {
//!         out.borrow_mut().push(*value);
//!         Flow::Continue
//!     },
//!     |_how| {},
//! );
//! sched.run_until_idle();
//! assert_eq!(*seen.borrow(), vec![10, 20, 30]);
//! ```

use std::rc::Rc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::clock::{Clock, SystemClock};
use super::collection::{Collection, Key};
use super::run::{Completed, Completion, Flow, Hook, Run, RunHandle, RunParams, Step};
use super::scheduler::Scheduler;
use crate::config::Config;
use crate::events::EventBus;
use crate::generation::Tracker;

/// Per-run options.
#[derive(Default)]
pub struct IterOptions {
    tracker: Option<Tracker>,
    block: bool,
    on_yield: Option<Hook>,
}

impl IterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the run silently once `tracker` is done.
    pub fn track(mut self, tracker: Tracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Same as [`track`](Self::track) for an optional tracker.
    pub fn track_opt(mut self, tracker: Option<Tracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Disables time slicing for this run.
    pub fn block(mut self) -> Self {
        self.block = true;
        self
    }

    /// Called whenever the run introduces asynchrony (slice yield or handler suspend).
    ///
    /// Lets an enclosing run know its element is not finishing synchronously.
    pub fn on_yield(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_yield = Some(Box::new(hook));
        self
    }
}

/// Factory of cooperative, time-sliced runs.
#[derive(Clone)]
pub struct Cooperator {
    budget: Option<Duration>,
    scheduler: Rc<dyn Scheduler>,
    clock: Rc<dyn Clock>,
    events: Option<EventBus>,
}

impl Cooperator {
    /// Creates a cooperator using `cfg.slice_budget` and the system clock.
    pub fn new(cfg: &Config, scheduler: impl Scheduler + 'static) -> Self {
        Self {
            budget: cfg.budget(),
            scheduler: Rc::new(scheduler),
            clock: Rc::new(SystemClock::new()),
            events: None,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    /// Publishes iteration events to `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Slice budget in effect (`None` = never yields on its own).
    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Visits every element of `items` in order, then calls `done` at most once.
    ///
    /// The first slice runs before this returns; later slices run on the scheduler.
    /// If the tracker in `opts` goes stale, the run stops and `done` is dropped unfired.
    pub fn for_each<V, H, D>(
        &self,
        items: impl Into<Collection<V>>,
        opts: IterOptions,
        handler: H,
        done: D,
    ) -> RunHandle
    where
        V: 'static,
        H: FnMut(&Key, &V, Step) -> Flow + 'static,
        D: FnOnce(Completion) + 'static,
    {
        let params = RunParams {
            tracker: opts.tracker,
            budget: if opts.block { None } else { self.budget },
            clock: Rc::clone(&self.clock),
            scheduler: Rc::clone(&self.scheduler),
            events: self.events.clone(),
        };
        Run::start(
            items.into().into_entries(),
            Box::new(handler),
            Box::new(done),
            opts.on_yield,
            params,
        )
    }

    /// Awaitable form of [`for_each`](Self::for_each).
    ///
    /// Resolves to `Some(completion)`, or `None` when the run was cancelled by its tracker
    /// (or abandoned on a dropped resume token).
    pub fn for_each_async<V, H>(
        &self,
        items: impl Into<Collection<V>>,
        opts: IterOptions,
        handler: H,
    ) -> Completed
    where
        V: 'static,
        H: FnMut(&Key, &V, Step) -> Flow + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.for_each(items, opts, handler, move |how| {
            let _ = tx.send(how);
        });
        Completed::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::generation::Generations;
    use crate::iterate::{ManualClock, ManualScheduler, Resume, RunStatus, TokioScheduler};
    use std::cell::{Cell, RefCell};

    const SLICE: Duration = Duration::from_millis(80);

    fn manual() -> (Cooperator, ManualScheduler, ManualClock) {
        let sched = ManualScheduler::new();
        let clock = ManualClock::new();
        let coop = Cooperator::new(&Config::default(), sched.clone()).with_clock(clock.clone());
        (coop, sched, clock)
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce(Completion) + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move |_how| c.set(c.get() + 1))
    }

    #[test]
    fn visits_in_order_and_completes_once() {
        let (coop, sched, _clock) = manual();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = seen.clone();
        let how = Rc::new(RefCell::new(None));
        let how_out = how.clone();

        let run = coop.for_each(
            vec![10, 20, 30],
            IterOptions::new(),
            move |_, v, _| {
                out.borrow_mut().push(*v);
                Flow::Continue
            },
            move |c| *how_out.borrow_mut() = Some(c),
        );

        assert_eq!(sched.run_until_idle(), 0);
        assert_eq!(*seen.borrow(), vec![10, 20, 30]);
        assert_eq!(*how.borrow(), Some(Completion::Exhausted));
        assert_eq!(run.status(), RunStatus::Finished);
        assert_eq!(run.visited(), 3);
    }

    #[test]
    fn empty_collection_completes_immediately() {
        let (coop, _sched, _clock) = manual();
        let (count, done) = counter();
        let run = coop.for_each(Vec::<u8>::new(), IterOptions::new(), |_, _, _| Flow::Continue, done);
        assert_eq!(count.get(), 1);
        assert!(run.is_empty());
    }

    #[test]
    fn early_break_at_every_index_completes_once() {
        let items: Vec<u32> = (0..6).collect();
        for stop_at in 0..items.len() {
            let (coop, sched, _clock) = manual();
            let visited = Rc::new(Cell::new(0usize));
            let v = visited.clone();
            let how = Rc::new(RefCell::new(Vec::new()));
            let how_out = how.clone();

            coop.for_each(
                items.clone(),
                IterOptions::new(),
                move |key, _, _| {
                    v.set(v.get() + 1);
                    if key.as_index() == Some(stop_at) {
                        Flow::Break
                    } else {
                        Flow::Continue
                    }
                },
                move |c| how_out.borrow_mut().push(c),
            );
            sched.run_until_idle();

            assert_eq!(visited.get(), stop_at + 1);
            assert_eq!(
                *how.borrow(),
                vec![Completion::Broken {
                    key: Key::Index(stop_at)
                }]
            );
        }
    }

    #[test]
    fn yields_when_slice_budget_is_exceeded() {
        let (coop, sched, clock) = manual();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = seen.clone();
        let yields = Rc::new(Cell::new(0));
        let y = yields.clone();
        let (count, done) = counter();

        let tick = clock.clone();
        let run = coop.for_each(
            vec!['a', 'b', 'c', 'd', 'e'],
            IterOptions::new().on_yield(move || y.set(y.get() + 1)),
            move |_, v, _| {
                out.borrow_mut().push(*v);
                tick.advance(Duration::from_millis(50));
                Flow::Continue
            },
            done,
        );

        // 0ms, 50ms visited; 100ms > 80ms yields before 'c'.
        assert_eq!(run.visited(), 2);
        assert_eq!(run.status(), RunStatus::Running);
        assert_eq!(sched.pending(), 1);
        assert_eq!(yields.get(), 1);

        assert!(sched.run_next());
        assert_eq!(run.visited(), 4);
        assert_eq!(count.get(), 0);

        sched.run_until_idle();
        assert_eq!(*seen.borrow(), vec!['a', 'b', 'c', 'd', 'e']);
        assert_eq!(count.get(), 1);
        assert_eq!(yields.get(), 2);
        assert_eq!(coop.budget(), Some(SLICE));
    }

    #[test]
    fn block_disables_time_slicing() {
        let (coop, sched, clock) = manual();
        let (count, done) = counter();
        coop.for_each(
            vec![1, 2, 3],
            IterOptions::new().block(),
            move |_, _, _| {
                clock.advance(Duration::from_secs(1));
                Flow::Continue
            },
            done,
        );
        assert_eq!(sched.pending(), 0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn stale_tracker_at_yield_boundary_cancels_silently() {
        let (coop, sched, clock) = manual();
        let gens = Generations::new();
        let tracker = gens.tracker("search");
        let (count, done) = counter();

        let run = coop.for_each(
            vec![1, 2, 3, 4],
            IterOptions::new().track(tracker.clone()),
            move |_, _, _| {
                clock.advance(Duration::from_millis(100));
                Flow::Continue
            },
            done,
        );
        assert_eq!(run.visited(), 1);

        let _fresh = tracker.step();
        sched.run_until_idle();

        assert_eq!(run.status(), RunStatus::Cancelled);
        assert_eq!(run.visited(), 1);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn stepping_inside_a_handler_stops_before_the_next_element() {
        let (coop, sched, _clock) = manual();
        let gens = Generations::new();
        let tracker = gens.tracker("search");
        let (count, done) = counter();
        let g = gens.clone();

        let run = coop.for_each(
            vec![1, 2, 3],
            IterOptions::new().track(tracker),
            move |key, _, step| {
                if key.as_index() == Some(1) {
                    g.step("search");
                    assert!(step.is_cancelled());
                }
                Flow::Continue
            },
            done,
        );
        sched.run_until_idle();

        assert_eq!(run.visited(), 2);
        assert_eq!(run.status(), RunStatus::Cancelled);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn break_on_stale_run_does_not_complete() {
        let (coop, _sched, _clock) = manual();
        let gens = Generations::new();
        let tracker = gens.tracker("search");
        let (count, done) = counter();
        let g = gens.clone();

        coop.for_each(
            vec![1],
            IterOptions::new().track(tracker),
            move |_, _, _| {
                g.step("search");
                Flow::Break
            },
            done,
        );
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn suspended_run_resumes_on_next_turn() {
        let (coop, sched, _clock) = manual();
        let parked: Rc<RefCell<Option<Resume>>> = Rc::new(RefCell::new(None));
        let slot = parked.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = seen.clone();
        let (count, done) = counter();

        let run = coop.for_each(
            vec![1, 2, 3],
            IterOptions::new(),
            move |_, v, step| {
                out.borrow_mut().push(*v);
                if *v == 2 {
                    *slot.borrow_mut() = Some(step.suspend());
                }
                Flow::Continue
            },
            done,
        );

        assert_eq!(run.status(), RunStatus::Suspended);
        assert_eq!(run.visited(), 2);
        assert_eq!(sched.run_until_idle(), 0);

        let token = parked.borrow_mut().take().unwrap();
        token.resume();
        assert_eq!(run.status(), RunStatus::Running);
        assert_eq!(count.get(), 0);

        sched.run_until_idle();
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn finish_from_suspension_breaks_at_that_element() {
        let (coop, _sched, _clock) = manual();
        let parked: Rc<RefCell<Option<Resume>>> = Rc::new(RefCell::new(None));
        let slot = parked.clone();
        let how = Rc::new(RefCell::new(Vec::new()));
        let how_out = how.clone();

        coop.for_each(
            Collection::keyed([("first", 1), ("second", 2)]),
            IterOptions::new(),
            move |_, _, step| {
                *slot.borrow_mut() = Some(step.suspend());
                Flow::Continue
            },
            move |c| how_out.borrow_mut().push(c),
        );

        parked.borrow_mut().take().unwrap().finish();
        assert_eq!(
            *how.borrow(),
            vec![Completion::Broken {
                key: Key::Field("first".into())
            }]
        );
    }

    #[test]
    fn resume_inside_handler_continues_without_reentry() {
        let (coop, sched, _clock) = manual();
        let (count, done) = counter();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = seen.clone();

        coop.for_each(
            vec![1, 2, 3],
            IterOptions::new(),
            move |_, v, step| {
                out.borrow_mut().push(*v);
                step.suspend().resume_sync();
                Flow::Continue
            },
            done,
        );

        assert_eq!(sched.pending(), 0);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn nested_run_parks_outer_until_inner_completes() {
        let (coop, sched, clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (count, done) = counter();

        let inner_coop = coop.clone();
        let out = log.clone();
        let tick = clock.clone();
        let run = coop.for_each(
            vec!["x", "y"],
            IterOptions::new(),
            move |_, outer, step| {
                let resume = step.suspend();
                let out = out.clone();
                let name = *outer;
                let tick = tick.clone();
                inner_coop.for_each(
                    vec![1, 2, 3],
                    IterOptions::new(),
                    move |_, inner, _| {
                        out.borrow_mut().push(format!("{name}{inner}"));
                        tick.advance(Duration::from_millis(60));
                        Flow::Continue
                    },
                    move |_| resume.resume_sync(),
                );
                Flow::Continue
            },
            done,
        );

        assert_eq!(run.status(), RunStatus::Suspended);
        sched.run_until_idle();

        assert_eq!(
            *log.borrow(),
            vec!["x1", "x2", "x3", "y1", "y2", "y3"]
        );
        assert_eq!(count.get(), 1);
        assert_eq!(run.status(), RunStatus::Finished);
    }

    #[test]
    fn dropped_resume_token_never_completes() {
        let (coop, sched, _clock) = manual();
        let (count, done) = counter();
        let run = coop.for_each(
            vec![1, 2],
            IterOptions::new(),
            |_, _, step| {
                drop(step.suspend());
                Flow::Continue
            },
            done,
        );
        sched.run_until_idle();
        assert_eq!(run.status(), RunStatus::Suspended);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn publishes_lifecycle_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let (coop, sched, clock) = manual();
        let coop = coop.with_events(bus);
        let gens = Generations::new();

        coop.for_each(
            vec![1, 2],
            IterOptions::new().track(gens.tracker("search")),
            move |_, _, _| {
                clock.advance(Duration::from_millis(90));
                Flow::Continue
            },
            |_| {},
        );
        sched.run_until_idle();

        let yielded = rx.try_recv().unwrap();
        assert_eq!(yielded.kind, EventKind::IterationYielded);
        assert_eq!(yielded.key.as_deref(), Some("#1"));
        assert_eq!(yielded.channel.as_deref(), Some("search"));
        let completed = rx.try_recv().unwrap();
        assert_eq!(completed.kind, EventKind::IterationCompleted);
        assert_eq!(completed.reason.as_deref(), Some("exhausted"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn async_form_resolves_on_tokio_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let cfg = Config {
                    slice_budget: Duration::from_nanos(1),
                    ..Config::default()
                };
                let coop = Cooperator::new(&cfg, TokioScheduler);
                let sum = Rc::new(Cell::new(0u64));
                let s = sum.clone();

                let how = coop
                    .for_each_async((1..=1000u64).collect::<Vec<_>>(), IterOptions::new(), move |_, v, _| {
                        s.set(s.get() + v);
                        Flow::Continue
                    })
                    .await;

                assert_eq!(how, Some(Completion::Exhausted));
                assert_eq!(sum.get(), 500_500);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn async_form_resolves_none_when_superseded() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let cfg = Config {
                    slice_budget: Duration::from_nanos(1),
                    ..Config::default()
                };
                let coop = Cooperator::new(&cfg, TokioScheduler);
                let gens = Generations::new();
                let first = gens.tracker("search");

                let stale = coop.for_each_async(
                    (0..10_000).collect::<Vec<u32>>(),
                    IterOptions::new().track(first.clone()),
                    |_, _, _| {
                        std::thread::sleep(Duration::from_micros(1));
                        Flow::Continue
                    },
                );
                let second = first.step();
                let fresh = coop.for_each_async(vec![1, 2], IterOptions::new().track(second), |_, _, _| {
                    Flow::Continue
                });

                assert_eq!(stale.await, None);
                assert_eq!(fresh.await, Some(Completion::Exhausted));
            })
            .await;
    }
}
