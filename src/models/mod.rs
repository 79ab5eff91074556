//! # Models
//!
//! Work items flowing into the pool and the results flowing out of it.

pub mod match_result;
pub mod work_item;

pub use match_result::{Candidate, MatchResult};
pub use work_item::{IndexedId, WorkItem};
