//! # Example: search
//!
//! "Latest keystroke wins": every keystroke steps the `search` channel and starts a
//! time-sliced scan over a large word list. Older scans notice their tracker went
//! stale and stop silently; only the newest one reports results.
//!
//! Shows how to:
//! - Issue trackers from [`Generations`] and step a channel to supersede work.
//! - Run [`Cooperator::for_each_async`] on a [`LocalSet`] with [`TokioScheduler`].
//! - Attach the built-in [`LogWriter`] through an [`Observer`].
//!
//! ## Flow
//! ```text
//! keystroke ──► Generations::step("search") ──► tracker("search")
//!     └─► Cooperator::for_each_async(words, track(tracker))
//!           ├─► slice budget hit ─► IterationYielded, continue on a later turn
//!           ├─► newer keystroke  ─► IterationCancelled (future resolves to None)
//!           └─► all words seen   ─► IterationCompleted (Some(Exhausted))
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example search --features logging
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use coopvisor::{
    Completion, Config, Cooperator, EventBus, Flow, Generations, IterOptions, LogWriter,
    Observer, Subscribe, TokioScheduler,
};
use tokio::task::LocalSet;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = Config {
        slice_budget: Duration::from_millis(2),
        ..Config::default()
    };
    let events = EventBus::new(cfg.event_capacity_clamped());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let observer = Observer::spawn(&cfg, &events, subs);

    let generations = Generations::with_events(events.clone());
    let coop = Cooperator::new(&cfg, TokioScheduler).with_events(events.clone());
    let words: Vec<String> = (0..200_000).map(|i| format!("word{i}")).collect();

    LocalSet::new()
        .run_until(async {
            let mut scans = Vec::new();
            for query in ["w", "wo", "word19"] {
                generations.step("search");
                let tracker = generations.tracker("search");

                let hits = Rc::new(Cell::new(0usize));
                let counter = hits.clone();
                let needle = query.to_string();
                let done = coop.for_each_async(
                    words.clone(),
                    IterOptions::new().track(tracker),
                    move |_key, word: &String, _step| {
                        if word.starts_with(&needle) {
                            counter.set(counter.get() + 1);
                        }
                        Flow::Continue
                    },
                );
                scans.push((query, hits, done));

                // The next keystroke arrives a little later.
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            for (query, hits, done) in scans {
                match done.await {
                    Some(Completion::Exhausted) => {
                        println!("[search] {query:?}: {} hits", hits.get())
                    }
                    Some(Completion::Broken { key }) => {
                        println!("[search] {query:?}: stopped at {key}")
                    }
                    None => println!("[search] {query:?}: superseded"),
                }
            }
        })
        .await;

    observer.shutdown().await;
}
