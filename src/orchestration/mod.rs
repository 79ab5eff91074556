//! # Orchestration
//!
//! Ties the pieces together for one batch:
//!
//! - **Matcher**: the external collaborator that turns one item into a result
//! - **BatchRunController**: resume validation, skip logic, dispatch and drain

pub mod batch_runner;
pub mod matcher;

pub use batch_runner::{BatchRunController, BatchRunStats};
pub use matcher::{FnMatcher, Matcher};
