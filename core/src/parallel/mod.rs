//! Task dispatch for per-file work
//!
//! Runs a task over a batch of items either sequentially or on a bounded
//! pool of OS threads. A failing or panicking task never aborts the batch:
//! the failure is logged and the item is left out of the results.

mod progress;

use crate::error::{OrganizerError, Result};
use crossbeam::channel::unbounded;
use indicatif::ProgressBar;
use log::{debug, error, warn};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub use progress::batch_bar;

/// Runs per-item tasks with a fixed number of workers
///
/// # Example
///
/// ```
/// use dicomorg_core::Dispatcher;
///
/// let dispatcher = Dispatcher::new(4).unwrap();
/// let mut doubled = dispatcher
///     .run(vec![1, 2, 3], |n| Ok(n * 2), "Doubling")
///     .unwrap();
/// doubled.sort();
/// assert_eq!(doubled, vec![2, 4, 6]);
///
/// assert!(Dispatcher::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatcher {
    num_workers: usize,
    show_progress: bool,
}

impl Dispatcher {
    /// Creates a dispatcher with `num_workers` workers
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `num_workers` is zero.
    pub fn new(num_workers: usize) -> Result<Self> {
        if num_workers < 1 {
            return Err(OrganizerError::config(format!(
                "number of workers ({}) must be a positive integer",
                num_workers
            )));
        }
        Ok(Self {
            num_workers,
            show_progress: false,
        })
    }

    /// Single-worker dispatcher
    pub fn sequential() -> Self {
        Self {
            num_workers: 1,
            show_progress: false,
        }
    }

    /// Builder: Draw a progress bar while running
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Runs `task` over `items` and returns the successful results
    ///
    /// With one worker the results keep input order. With more, the order
    /// is whatever order the workers finished in.
    ///
    /// # Errors
    ///
    /// Only fails when the worker pool cannot be started; task failures are
    /// logged and dropped.
    pub fn run<T, R, F>(&self, items: Vec<T>, task: F, label: &str) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
    {
        let results = self.execute(items, task, label)?;
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }

    /// Like [`Dispatcher::run`] but always returns results in input order
    pub fn run_indexed<T, R, F>(&self, items: Vec<T>, task: F, label: &str) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
    {
        let mut results = self.execute(items, task, label)?;
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }

    fn execute<T, R, F>(&self, items: Vec<T>, task: F, label: &str) -> Result<Vec<(usize, R)>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let bar = batch_bar(items.len(), label, self.show_progress);
        let results = if self.num_workers == 1 {
            items
                .into_iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    let outcome = invoke(&task, index, item);
                    bar.inc(1);
                    outcome.map(|r| (index, r))
                })
                .collect()
        } else {
            self.execute_pooled(items, &task, &bar)?
        };
        bar.finish_and_clear();

        Ok(results)
    }

    fn execute_pooled<T, R, F>(
        &self,
        items: Vec<T>,
        task: &F,
        bar: &ProgressBar,
    ) -> Result<Vec<(usize, R)>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
    {
        // Pool lives for this batch only
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_workers)
            .thread_name(|i| format!("dicomorg-worker-{}", i))
            .build()?;

        let (result_tx, result_rx) = unbounded();
        pool.scope(|s| {
            for (index, item) in items.into_iter().enumerate() {
                let result_tx = result_tx.clone();
                s.spawn(move |_| {
                    if let Some(result) = invoke(task, index, item) {
                        // Receiver outlives the scope
                        let _ = result_tx.send((index, result));
                    }
                    bar.inc(1);
                });
            }
        });
        drop(result_tx);

        Ok(result_rx.into_iter().collect())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Calls `task`, turning errors and panics into a logged `None`
fn invoke<T, R, F>(task: &F, index: usize, item: T) -> Option<R>
where
    F: Fn(T) -> Result<R>,
{
    match catch_unwind(AssertUnwindSafe(|| task(item))) {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e @ OrganizerError::Decode { .. })) => {
            debug!("Skipping task {}: {}", index, e);
            None
        }
        Ok(Err(e)) => {
            warn!("Skipping task {}: {}", index, e);
            None
        }
        Err(payload) => {
            error!("Task {} panicked: {}", index, panic_message(payload.as_ref()));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn flaky(n: u32) -> Result<u32> {
        if n % 3 == 0 {
            Err(OrganizerError::Encode {
                path: PathBuf::from(format!("{}.dcm", n)),
                message: "refused".to_string(),
            })
        } else {
            Ok(n * 10)
        }
    }

    #[test]
    fn test_zero_workers_is_configuration_error() {
        let err = Dispatcher::new(0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sequential_preserves_order() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let results = dispatcher.run((1..=5).collect(), flaky, "test").unwrap();
        assert_eq!(results, vec![10, 20, 40, 50]);
    }

    #[rstest]
    #[case(2)]
    #[case(4)]
    #[case(16)]
    fn test_pooled_collects_every_success(#[case] workers: usize) {
        let dispatcher = Dispatcher::new(workers).unwrap();
        let results: HashSet<u32> = dispatcher
            .run((1..=30).collect(), flaky, "test")
            .unwrap()
            .into_iter()
            .collect();

        let expected: HashSet<u32> = (1..=30).filter(|n| n % 3 != 0).map(|n| n * 10).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_run_indexed_restores_input_order() {
        let dispatcher = Dispatcher::new(4).unwrap();
        let results = dispatcher
            .run_indexed((1..=20).collect(), flaky, "test")
            .unwrap();
        let expected: Vec<u32> = (1..=20).filter(|n| n % 3 != 0).map(|n| n * 10).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_panicking_task_does_not_abort_batch() {
        let dispatcher = Dispatcher::new(3).unwrap();
        let calls = AtomicUsize::new(0);
        let mut results = dispatcher
            .run(
                vec![1, 2, 3, 4],
                |n: u32| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if n == 2 {
                        panic!("task blew up");
                    }
                    Ok(n)
                },
                "test",
            )
            .unwrap();
        results.sort();

        assert_eq!(results, vec![1, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_empty_batch() {
        let dispatcher = Dispatcher::new(4).unwrap();
        let results: Vec<u32> = dispatcher.run(Vec::new(), flaky, "test").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
