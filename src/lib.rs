#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Match Core
//!
//! Resumable batch matching of a large record collection against an external
//! similarity-search service.
//!
//! ## Overview
//!
//! A batch run streams work items through a bounded pool of worker threads.
//! Each worker asks a [`Matcher`] for the item's [`MatchResult`] and hands it
//! to a [`ResultAccumulator`]. The journaled accumulator writes one durable
//! line per result, so a stopped run can be restarted and will skip every
//! item it already finished, provided it runs under the same
//! [`QueryDescriptor`].
//!
//! ## Guarantees
//!
//! - **Backpressure**: submission is a zero-capacity hand-off, so at most one
//!   item per worker is accepted but unfinished
//! - **At most once per item** across resumed runs
//! - **Crash consistency**: torn journal lines are never replayed as completed
//! - **Configuration safety**: resuming under a different descriptor fails
//!   before any work is dispatched
//!
//! ## Module Organization
//!
//! - [`execution`] - Rendezvous job queue and worker pool
//! - [`accumulator`] - In-memory and journaled result accumulators
//! - [`query`] - Query descriptors and their equality rule
//! - [`orchestration`] - Matcher trait and batch run controller
//! - [`models`] - Work items and match results
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchmatch_core::{
//!     BatchRunController, FnMatcher, IndexedId, MatchResult, MatcherSettings, ResultAccumulator,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let matcher = FnMatcher::new(
//!     MatcherSettings::default().query_descriptor(),
//!     |item: &IndexedId| Ok(MatchResult::new(item.id.clone(), 12, 0.9, vec![])),
//! );
//! let items = vec![IndexedId::new("rec-1"), IndexedId::new("rec-2")];
//!
//! let (controller, results) = BatchRunController::in_memory(items, matcher, 4)?;
//! let stats = controller.run()?;
//! println!("finished {} items, {} results", stats.total_finished, results.n_completed());
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod config;
pub mod constants;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod query;

pub use accumulator::{
    open_accumulator, read_journal, InMemoryAccumulator, JournalAccumulator, JournalSnapshot,
    ResultAccumulator,
};
pub use config::{BatchMatchConfig, LoggingConfig, MatcherSettings};
pub use error::{BatchMatchError, Result};
pub use execution::{ExceptionHandler, JobQueue, PoolState, PoolStats, WorkerPool};
pub use models::{Candidate, IndexedId, MatchResult, WorkItem};
pub use orchestration::{BatchRunController, BatchRunStats, FnMatcher, Matcher};
pub use query::{descriptors_equal, QueryDescriptor};
