//! # Execution
//!
//! Bounded-concurrency dispatch: a zero-capacity [`JobQueue`] provides the
//! backpressure and a [`WorkerPool`] of threads drains it.

pub mod job_queue;
pub mod worker_pool;

pub use job_queue::{JobQueue, QueueCounters};
pub use worker_pool::{ExceptionHandler, PoolState, PoolStats, WorkFn, WorkerPool};
