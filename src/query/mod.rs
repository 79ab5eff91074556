//! # Query Descriptors
//!
//! The matching configuration as a comparable value, and the equality rule
//! that decides whether a journal may be resumed.

pub mod descriptor;
pub mod equality;

pub use descriptor::QueryDescriptor;
pub use equality::descriptors_equal;
