//! Bounded-concurrency executor for one stage

use super::Shutdown;
use crate::ItemError;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;

/// What happened to one work item
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Failed(ItemError),
    /// Not started, or aborted, because of an operator interrupt
    Cancelled,
}

/// Outcome counts of one `run` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Applies a worker to a list of items, at most `workers` at a time
///
/// Every item yields exactly one [`Outcome`], handed to the caller's handler
/// in completion order. A failing or panicking item never affects the others.
#[derive(Debug, Clone)]
pub struct StageRunner {
    workers: usize,
    shutdown: Shutdown,
}

impl StageRunner {
    pub fn new(workers: usize, shutdown: Shutdown) -> Self {
        Self {
            workers: workers.max(1),
            shutdown,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `work` over `items`
    ///
    /// `on_outcome` runs on the calling task as each item finishes, so it can
    /// persist results without further locking. Items still unsubmitted when
    /// a stop is requested are reported as cancelled.
    pub async fn run<I, T, F, Fut, H>(&self, items: Vec<I>, mut work: F, mut on_outcome: H) -> RunCounts
    where
        I: Clone,
        T: Send + 'static,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<T, ItemError>> + Send + 'static,
        H: FnMut(&I, Outcome<T>),
    {
        let mut counts = RunCounts::default();
        let mut report = |item: &I, outcome: Outcome<T>| {
            match &outcome {
                Outcome::Completed(_) => counts.completed += 1,
                Outcome::Failed(_) => counts.failed += 1,
                Outcome::Cancelled => counts.cancelled += 1,
            }
            on_outcome(item, outcome);
        };

        let mut tasks: JoinSet<(usize, Outcome<T>)> = JoinSet::new();
        let mut in_flight: HashSet<usize> = HashSet::new();
        let mut next = 0;

        loop {
            while tasks.len() < self.workers && next < items.len() && !self.halted() {
                let index = next;
                next += 1;

                let future = work(items[index].clone());
                let abort = self.shutdown.abort_token().clone();
                in_flight.insert(index);
                tasks.spawn(async move {
                    let outcome = tokio::select! {
                        biased;
                        _ = abort.cancelled() => Outcome::Cancelled,
                        result = AssertUnwindSafe(future).catch_unwind() => match result {
                            Ok(Ok(value)) => Outcome::Completed(value),
                            Ok(Err(ItemError::Cancelled)) => Outcome::Cancelled,
                            Ok(Err(e)) => Outcome::Failed(e),
                            Err(panic) => Outcome::Failed(ItemError::Panicked(panic_message(&*panic))),
                        },
                    };
                    (index, outcome)
                });
            }

            match tasks.join_next().await {
                Some(Ok((index, outcome))) => {
                    in_flight.remove(&index);
                    report(&items[index], outcome);
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Worker task did not complete");
                }
                None => break,
            }
        }

        // Only reachable if a task died outside the panic guard
        for index in in_flight {
            report(
                &items[index],
                Outcome::Failed(ItemError::Panicked("worker task lost".to_string())),
            );
        }

        for item in &items[next..] {
            report(item, Outcome::Cancelled);
        }

        counts
    }

    fn halted(&self) -> bool {
        self.shutdown.stop_token().is_cancelled() || self.shutdown.abort_token().is_cancelled()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
