//! # Worker Pool
//!
//! Fixed set of worker threads pulling from a [`JobQueue`]. Each worker runs
//! the caller's work function for one item at a time and reports completion.
//!
//! ## Failure policy
//!
//! The first failing item aborts the pool: the exception handler may replace
//! the error, the result is stored as the abort error, and the queue is
//! closed so every later `submit` fails fast and idle workers stop taking.
//! Items workers already took keep running to completion. Later failures are
//! logged and discarded.
//!
//! ## Lifecycle
//!
//! `Created -> Running -> Draining -> Stopped`. `stop` releases idle workers
//! immediately and lets busy ones finish their current item; it does not
//! wait for drain.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::error::{BatchMatchError, Result};
use crate::execution::job_queue::{JobQueue, QueueCounters, Signal};
use crate::models::WorkItem;

/// Per-item work run inside a worker
pub type WorkFn<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Hook invoked with the first failing item and its error. Returns the error
/// to record, either the original or a replacement.
pub type ExceptionHandler<T> = Arc<dyn Fn(&T, anyhow::Error) -> anyhow::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    Created,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Draining => "draining",
            PoolState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Consistent view of pool bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub currently_queued: usize,
    pub total_submitted: usize,
    pub total_finished: usize,
    /// Finished items whose work function failed
    pub total_failed: usize,
}

struct PoolShared<T> {
    name: String,
    queue: JobQueue<T>,
    shutdown: Signal,
    work: WorkFn<T>,
    exception_handler: ExceptionHandler<T>,
    abort_error: Mutex<Option<BatchMatchError>>,
}

impl<T: WorkItem> PoolShared<T> {
    fn worker_loop(&self, worker_index: usize) {
        debug!(pool = %self.name, worker = worker_index, "POOL: worker started");

        while let Some(item) = self.queue.take(&self.shutdown) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.work)(&item)))
                .unwrap_or_else(|payload| Err(anyhow::anyhow!(panic_message(payload.as_ref()))));

            let failed = match outcome {
                Ok(()) => false,
                Err(err) => {
                    self.record_failure(&item, err);
                    true
                }
            };
            self.queue.finish(failed);
        }

        debug!(pool = %self.name, worker = worker_index, "POOL: worker exiting");
    }

    fn record_failure(&self, item: &T, err: anyhow::Error) {
        let mut slot = self.abort_error.lock();
        if slot.is_some() {
            warn!(
                pool = %self.name,
                item_id = %item.item_id(),
                error = %format!("{err:#}"),
                "POOL: discarding failure after abort"
            );
            return;
        }

        let err = (self.exception_handler)(item, err);
        let failure = BatchMatchError::MatchFailure {
            item_id: item.item_id().to_string(),
            reason: format!("{err:#}"),
        };
        error!(
            pool = %self.name,
            item_id = %item.item_id(),
            error = %failure,
            "❌ POOL: work failed, aborting pool"
        );
        self.queue.close(failure.to_string());
        *slot = Some(failure);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_string()
    }
}

/// Bounded pool of worker threads fed through a rendezvous queue
pub struct WorkerPool<T> {
    shared: Arc<PoolShared<T>>,
    worker_count: usize,
    state: Mutex<PoolState>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> WorkerPool<T>
where
    T: WorkItem + Send + 'static,
{
    /// Create a pool of `worker_count` workers; nothing runs until `start`
    pub fn new<F>(name: impl Into<String>, worker_count: usize, work: F) -> Result<Self>
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if worker_count == 0 {
            return Err(BatchMatchError::Configuration(
                "worker pool needs at least one worker".to_string(),
            ));
        }

        Ok(Self {
            shared: Arc::new(PoolShared {
                name: name.into(),
                queue: JobQueue::new(),
                shutdown: Signal::new(),
                work: Arc::new(work),
                exception_handler: Arc::new(|_item: &T, err: anyhow::Error| err),
                abort_error: Mutex::new(None),
            }),
            worker_count,
            state: Mutex::new(PoolState::Created),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Replace the exception handler. Only allowed before `start`.
    pub fn with_exception_handler(mut self, handler: ExceptionHandler<T>) -> Result<Self> {
        let shared = Arc::get_mut(&mut self.shared).ok_or_else(|| {
            BatchMatchError::Misuse("exception handler must be set before start".to_string())
        })?;
        shared.exception_handler = handler;
        Ok(self)
    }

    /// Launch exactly `worker_count` worker threads
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != PoolState::Created {
            return Err(BatchMatchError::Misuse(format!(
                "worker pool '{}' cannot start from state {}",
                self.shared.name, *state
            )));
        }

        let mut handles = self.handles.lock();
        for worker_index in 0..self.worker_count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{worker_index}", self.shared.name))
                .spawn(move || shared.worker_loop(worker_index))
                .map_err(|e| {
                    // Release any workers that did start
                    self.shared.shutdown.fire();
                    BatchMatchError::Internal(format!("failed to spawn worker: {e}"))
                })?;
            handles.push(handle);
        }

        *state = PoolState::Running;
        info!(
            pool = %self.shared.name,
            workers = self.worker_count,
            "🚀 POOL: started"
        );
        Ok(())
    }

    /// Hand an item to a worker, blocking until one accepts it
    pub fn submit(&self, item: T) -> Result<()> {
        let state = *self.state.lock();
        match state {
            PoolState::Running | PoolState::Draining => self.shared.queue.submit(item),
            PoolState::Created => Err(BatchMatchError::Misuse(format!(
                "worker pool '{}' has not been started",
                self.shared.name
            ))),
            PoolState::Stopped => Err(BatchMatchError::QueueClosed {
                reason: format!("worker pool '{}' is stopped", self.shared.name),
            }),
        }
    }

    /// Block until every submitted item has finished
    pub fn await_drain(&self) {
        {
            let mut state = self.state.lock();
            if *state == PoolState::Running {
                *state = PoolState::Draining;
            }
        }
        self.shared.queue.wait_until_drained();
        debug!(pool = %self.shared.name, "POOL: drained");
    }

    /// Cooperatively cancel all workers. Does not wait for drain.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == PoolState::Stopped {
            return;
        }
        *state = PoolState::Stopped;
        drop(state);

        self.shared
            .queue
            .close(format!("worker pool '{}' is stopped", self.shared.name));
        self.shared.shutdown.fire();
        info!(pool = %self.shared.name, "🛑 POOL: stopped");
    }

    /// Wait for worker threads to exit. Call after `stop`.
    pub fn join(&self) {
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!(pool = %self.shared.name, "POOL: worker thread panicked outside work");
            }
        }
    }

    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.abort_error.lock().is_some()
    }

    /// The error recorded by the first failing item, if any
    pub fn abort_error(&self) -> Option<BatchMatchError> {
        self.shared.abort_error.lock().clone()
    }

    pub fn stats(&self) -> PoolStats {
        let QueueCounters {
            currently_queued,
            total_submitted,
            total_finished,
            total_failed,
        } = self.shared.queue.counters();
        PoolStats {
            currently_queued,
            total_submitted,
            total_finished,
            total_failed,
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shared.queue.close("worker pool dropped");
        self.shared.shutdown.fire();
        for handle in self.handles.get_mut().drain(..) {
            let _ = handle.join();
        }
    }
}

impl<T> fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("worker_count", &self.worker_count)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexedId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ids(n: usize) -> Vec<IndexedId> {
        (1..=n).map(|i| IndexedId::new(format!("i{i}"))).collect()
    }

    #[test]
    fn test_all_items_processed() {
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);
        let pool = WorkerPool::new("test", 3, move |_item: &IndexedId| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        pool.start().unwrap();
        for item in ids(20) {
            pool.submit(item).unwrap();
        }
        pool.await_drain();
        pool.stop();
        pool.join();

        assert_eq!(processed.load(Ordering::SeqCst), 20);
        assert_eq!(
            pool.stats(),
            PoolStats {
                currently_queued: 0,
                total_submitted: 20,
                total_finished: 20,
                total_failed: 0,
            }
        );
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_in_flight_never_exceeds_worker_count() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_w, peak_w) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let pool = WorkerPool::new("bounded", 2, move |_item: &IndexedId| {
            let now = in_flight_w.fetch_add(1, Ordering::SeqCst) + 1;
            peak_w.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            in_flight_w.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        pool.start().unwrap();
        for item in ids(30) {
            pool.submit(item).unwrap();
        }
        pool.await_drain();
        pool.stop();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.stats().total_finished, 30);
    }

    #[test]
    fn test_first_failure_aborts_and_rejects_submissions() {
        let pool = WorkerPool::new("failing", 1, |item: &IndexedId| {
            if item.id == "i2" {
                anyhow::bail!("backend unavailable");
            }
            Ok(())
        })
        .unwrap();

        pool.start().unwrap();
        pool.submit(IndexedId::new("i1")).unwrap();
        pool.submit(IndexedId::new("i2")).unwrap();
        pool.await_drain();

        assert!(pool.is_aborted());
        let err = pool.submit(IndexedId::new("i3")).unwrap_err();
        assert!(err.is_queue_closed());
        assert!(err.to_string().contains("i2"));

        match pool.abort_error() {
            Some(BatchMatchError::MatchFailure { item_id, reason }) => {
                assert_eq!(item_id, "i2");
                assert!(reason.contains("backend unavailable"));
            }
            other => panic!("unexpected abort error: {other:?}"),
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                currently_queued: 0,
                total_submitted: 2,
                total_finished: 2,
                total_failed: 1,
            }
        );
        pool.stop();
    }

    #[test]
    fn test_failed_count_never_leads_finished_count() {
        let pool = Arc::new(
            WorkerPool::new("consistent", 3, |item: &IndexedId| {
                thread::sleep(Duration::from_millis(1));
                if item.id.ends_with('0') {
                    anyhow::bail!("bad record {}", item.id);
                }
                Ok(())
            })
            .unwrap(),
        );
        pool.start().unwrap();

        let sampler = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..200 {
                    let stats = pool.stats();
                    assert!(stats.total_failed <= stats.total_finished, "{stats:?}");
                    assert_eq!(
                        stats.total_submitted,
                        stats.total_finished + stats.currently_queued,
                        "{stats:?}"
                    );
                    assert!(stats.currently_queued <= 3, "{stats:?}");
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        for item in ids(40) {
            if pool.submit(item).is_err() {
                break;
            }
        }
        pool.await_drain();
        sampler.join().unwrap();
        pool.stop();
        pool.join();

        let stats = pool.stats();
        assert!(stats.total_failed >= 1);
        assert_eq!(stats.total_submitted, stats.total_finished);
    }

    #[test]
    fn test_exception_handler_replaces_error() {
        let pool = WorkerPool::new("handled", 1, |_item: &IndexedId| {
            anyhow::bail!("raw failure")
        })
        .unwrap()
        .with_exception_handler(Arc::new(|item: &IndexedId, err: anyhow::Error| {
            err.context(format!("while matching {}", item.id))
        }))
        .unwrap();

        pool.start().unwrap();
        pool.submit(IndexedId::new("x")).unwrap();
        pool.await_drain();
        pool.stop();

        let Some(BatchMatchError::MatchFailure { reason, .. }) = pool.abort_error() else {
            panic!("expected match failure");
        };
        assert!(reason.contains("while matching x"));
        assert!(reason.contains("raw failure"));
    }

    #[test]
    fn test_panicking_work_is_reported_as_failure() {
        let pool = WorkerPool::new("panicky", 2, |_item: &IndexedId| -> anyhow::Result<()> {
            panic!("boom")
        })
        .unwrap();

        pool.start().unwrap();
        pool.submit(IndexedId::new("p1")).unwrap();
        pool.await_drain();
        pool.stop();
        pool.join();

        let err = pool.abort_error().unwrap();
        assert!(err.to_string().contains("boom"));
        assert_eq!(pool.stats().total_finished, 1);
    }

    #[test]
    fn test_lifecycle_misuse() {
        let pool = WorkerPool::new("lifecycle", 1, |_item: &IndexedId| Ok(())).unwrap();
        assert!(matches!(
            pool.submit(IndexedId::new("early")),
            Err(BatchMatchError::Misuse(_))
        ));

        pool.start().unwrap();
        assert!(matches!(pool.start(), Err(BatchMatchError::Misuse(_))));

        pool.stop();
        assert!(pool.submit(IndexedId::new("late")).unwrap_err().is_queue_closed());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = WorkerPool::new("empty", 0, |_item: &IndexedId| Ok(()));
        assert!(matches!(result, Err(BatchMatchError::Configuration(_))));
    }

    #[test]
    fn test_stop_releases_idle_workers() {
        let pool = WorkerPool::new("idle", 4, |_item: &IndexedId| Ok(())).unwrap();
        pool.start().unwrap();
        pool.stop();
        pool.join();
        assert_eq!(pool.state(), PoolState::Stopped);
    }
}
