//! # Result Accumulators
//!
//! Where workers put their results. Two variants share one contract:
//!
//! - [`InMemoryAccumulator`] keeps results in completion order, nothing persisted
//! - [`JournalAccumulator`] appends one durable line per result so a run can be
//!   resumed after a restart
//!
//! The batch controller only sees the [`ResultAccumulator`] trait and never
//! knows which variant it is driving.

pub mod journal;
pub mod memory;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::BatchMatchConfig;
use crate::error::Result;
use crate::models::MatchResult;
use crate::query::QueryDescriptor;

pub use journal::{read_journal, JournalAccumulator, JournalSnapshot};
pub use memory::InMemoryAccumulator;

/// Shared sink for match results.
///
/// `add_result` is called concurrently from every worker and must serialize
/// internally. `completed_ids` returns a snapshot that later `add_result`
/// calls do not affect.
pub trait ResultAccumulator: Send + Sync {
    fn add_result(&self, result: MatchResult) -> Result<()>;

    fn completed_ids(&self) -> HashSet<String>;

    fn n_completed(&self) -> usize;

    /// The configuration this accumulator was created or reopened against
    fn query_descriptor(&self) -> QueryDescriptor;
}

/// Open the accumulator selected by configuration: journaled when a resume
/// file is configured, in-memory otherwise.
pub fn open_accumulator(
    config: &BatchMatchConfig,
    descriptor: &QueryDescriptor,
) -> Result<Arc<dyn ResultAccumulator>> {
    match &config.resume_file {
        Some(path) => Ok(Arc::new(JournalAccumulator::open(path, descriptor)?)),
        None => Ok(Arc::new(InMemoryAccumulator::new(descriptor.clone()))),
    }
}
