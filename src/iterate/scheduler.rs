//! # Host schedulers: where a yielded run continues.
//!
//! A [`Scheduler`] receives a job and runs it on a *later* turn of the host's
//! single execution thread.
//!
//! - [`TokioScheduler`]: `tokio::task::spawn_local`; must be used inside a [`LocalSet`](tokio::task::LocalSet).
//! - [`ManualScheduler`]: FIFO queue drained explicitly; deterministic, used by tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Deferred unit of work.
pub type Job = Box<dyn FnOnce() + 'static>;

/// Defers jobs to a later turn of the host scheduler.
///
/// Implementations must not run the job before `defer` returns.
pub trait Scheduler {
    fn defer(&self, job: Job);
}

/// Runs deferred jobs as local tokio tasks.
///
/// ### Panics
/// `defer` panics when called outside a `LocalSet` context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn defer(&self, job: Job) {
        tokio::task::spawn_local(async move { job() });
    }
}

/// Queue of deferred jobs, drained by the caller. Clones share the queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<VecDeque<Job>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs the oldest job; returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        let job = self.queue.borrow_mut().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs (including ones deferred meanwhile) until the queue is empty.
    ///
    /// Returns how many jobs ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, job: Job) {
        self.queue.borrow_mut().push_back(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn manual_runs_fifo_including_nested() {
        let sched = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (l1, s1) = (log.clone(), sched.clone());
        sched.defer(Box::new(move || {
            l1.borrow_mut().push(1);
            let l3 = l1.clone();
            s1.defer(Box::new(move || l3.borrow_mut().push(3)));
        }));
        let l2 = log.clone();
        sched.defer(Box::new(move || l2.borrow_mut().push(2)));

        assert_eq!(sched.pending(), 2);
        assert_eq!(sched.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tokio_scheduler_runs_on_local_set() {
        let local = tokio::task::LocalSet::new();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        local
            .run_until(async move {
                TokioScheduler.defer(Box::new(move || {
                    h.set(true);
                    let _ = tx.send(());
                }));
                assert!(!hit.get());
                rx.await.unwrap();
                assert!(hit.get());
            })
            .await;
    }
}
