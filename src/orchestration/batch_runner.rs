//! # Batch Run Controller
//!
//! Drives one batch: skips items already recorded by the accumulator,
//! dispatches the rest through a [`WorkerPool`], and blocks until drained.
//!
//! A controller is single-use. Construction fails with
//! [`BatchMatchError::ConfigurationMismatch`] when the accumulator was
//! created under a different query descriptor than the matcher's, before
//! any worker is started.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument, trace, warn};

use crate::accumulator::{open_accumulator, InMemoryAccumulator, ResultAccumulator};
use crate::config::BatchMatchConfig;
use crate::error::{BatchMatchError, Result};
use crate::execution::{ExceptionHandler, WorkerPool};
use crate::logging::{log_batch_operation, log_error};
use crate::models::WorkItem;
use crate::orchestration::matcher::Matcher;
use crate::query::descriptors_equal;

type ItemSource<T> = Box<dyn Iterator<Item = T> + Send>;

/// Running counters for a batch.
///
/// Once `run` returns successfully,
/// `total_finished + total_skipped` equals the number of items the source
/// produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRunStats {
    pub currently_queued: usize,
    pub total_submitted: usize,
    pub total_finished: usize,
    pub total_failed: usize,
    /// Items skipped because a previous run already completed them
    pub total_skipped: usize,
}

pub struct BatchRunController<T> {
    items: Mutex<Option<ItemSource<T>>>,
    pool: WorkerPool<T>,
    accumulator: Arc<dyn ResultAccumulator>,
    completed_ids: HashSet<String>,
    resuming: bool,
    started: AtomicBool,
    total_skipped: AtomicUsize,
}

impl<T> BatchRunController<T>
where
    T: WorkItem + Send + 'static,
{
    /// Prepare a run of `matcher` over `items` with `concurrency` workers,
    /// recording results into `accumulator`.
    pub fn new<I, M>(
        items: I,
        matcher: M,
        accumulator: Arc<dyn ResultAccumulator>,
        concurrency: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        M: Matcher<T> + 'static,
    {
        let stored = accumulator.query_descriptor();
        let current = matcher.query_descriptor();
        if !descriptors_equal(&stored, &current) {
            let err = BatchMatchError::ConfigurationMismatch {
                stored: stored.to_string(),
                current: current.to_string(),
            };
            log_error("batch_runner", "new", &err.to_string(), None);
            return Err(err);
        }

        let completed_ids = accumulator.completed_ids();
        let resuming = !completed_ids.is_empty();

        let matcher = Arc::new(matcher);
        let sink = Arc::clone(&accumulator);
        let pool = WorkerPool::new("batch-match", concurrency, move |item: &T| {
            let result = matcher.match_item(item)?;
            if result.item_id != item.item_id() {
                anyhow::bail!(
                    "matcher returned a result for '{}' while matching '{}'",
                    result.item_id,
                    item.item_id()
                );
            }
            sink.add_result(result)?;
            Ok(())
        })?;

        if resuming {
            info!(
                completed = completed_ids.len(),
                "BATCH: resuming, previously completed items will be skipped"
            );
        }

        Ok(Self {
            items: Mutex::new(Some(Box::new(items.into_iter()))),
            pool,
            accumulator,
            completed_ids,
            resuming,
            started: AtomicBool::new(false),
            total_skipped: AtomicUsize::new(0),
        })
    }

    /// Start a fresh run whose results are kept in memory
    pub fn in_memory<I, M>(
        items: I,
        matcher: M,
        concurrency: usize,
    ) -> Result<(Self, Arc<InMemoryAccumulator>)>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        M: Matcher<T> + 'static,
    {
        let accumulator = Arc::new(InMemoryAccumulator::new(matcher.query_descriptor()));
        let controller = Self::new(items, matcher, accumulator.clone(), concurrency)?;
        Ok((controller, accumulator))
    }

    /// Build a run from configuration: concurrency from `config`, and a
    /// journaled accumulator when a resume file is configured.
    pub fn from_config<I, M>(items: I, matcher: M, config: &BatchMatchConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        M: Matcher<T> + 'static,
    {
        config.validate()?;
        let accumulator = open_accumulator(config, &matcher.query_descriptor())?;
        Self::new(items, matcher, accumulator, config.concurrency)
    }

    /// Replace the pool's exception handler
    pub fn with_exception_handler(self, handler: ExceptionHandler<T>) -> Result<Self> {
        let pool = self.pool.with_exception_handler(handler)?;
        Ok(Self { pool, ..self })
    }

    /// Whether the accumulator already held completed items
    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    pub fn accumulator(&self) -> &Arc<dyn ResultAccumulator> {
        &self.accumulator
    }

    pub fn stats(&self) -> BatchRunStats {
        let pool = self.pool.stats();
        BatchRunStats {
            currently_queued: pool.currently_queued,
            total_submitted: pool.total_submitted,
            total_finished: pool.total_finished,
            total_failed: pool.total_failed,
            total_skipped: self.total_skipped.load(Ordering::Acquire),
        }
    }

    /// Dispatch every item and block until all dispatched work finished.
    ///
    /// Returns the first match failure if any item failed; items already
    /// handed to workers still complete before this returns.
    #[instrument(skip(self), fields(workers = self.pool.worker_count(), resuming = self.resuming))]
    pub fn run(&self) -> Result<BatchRunStats> {
        if self.started.swap(true, Ordering::AcqRel) {
            let err = BatchMatchError::Misuse("batch run controller was already run".to_string());
            error!(error = %err, "BATCH: refusing second run");
            return Err(err);
        }
        let items = self
            .items
            .lock()
            .take()
            .ok_or_else(|| BatchMatchError::Misuse("item source already consumed".to_string()))?;

        log_batch_operation(
            "run",
            Some(self.pool.worker_count()),
            Some(self.resuming),
            "started",
            None,
        );

        self.pool.start()?;
        let dispatched = self.dispatch(items);
        self.pool.await_drain();
        self.pool.stop();
        self.pool.join();

        let stats = self.stats();
        if let Some(err) = self.pool.abort_error() {
            log_error("batch_runner", "run", &err.to_string(), None);
            return Err(err);
        }
        dispatched?;

        log_batch_operation(
            "run",
            Some(self.pool.worker_count()),
            Some(self.resuming),
            "completed",
            Some(&format!(
                "finished={} skipped={} completed={}",
                stats.total_finished,
                stats.total_skipped,
                self.accumulator.n_completed()
            )),
        );
        Ok(stats)
    }

    fn dispatch(&self, items: ItemSource<T>) -> Result<()> {
        for item in items {
            if self.resuming && self.completed_ids.contains(item.item_id()) {
                trace!(item_id = %item.item_id(), "BATCH: already completed, skipping");
                self.total_skipped.fetch_add(1, Ordering::AcqRel);
                continue;
            }

            if let Err(err) = self.pool.submit(item) {
                if err.is_queue_closed() {
                    warn!(error = %err, "BATCH: queue closed, no further items will be submitted");
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

impl<T> BatchRunController<T>
where
    T: WorkItem + Send + 'static,
{
    /// Run on tokio's blocking pool so async callers do not stall the runtime
    pub async fn run_async(self: Arc<Self>) -> Result<BatchRunStats> {
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| BatchMatchError::Internal(format!("batch run task failed: {e}")))?
    }
}
