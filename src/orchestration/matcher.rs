//! The matching collaborator seen by the batch controller.

use std::sync::Arc;

use crate::models::MatchResult;
use crate::query::QueryDescriptor;

/// Produces one result per work item against a similarity-search backend.
///
/// Implementations may perform network I/O and may fail; failures are
/// opaque to the batch machinery and abort the run.
pub trait Matcher<T>: Send + Sync {
    /// The exact configuration this matcher queries with
    fn query_descriptor(&self) -> QueryDescriptor;

    fn match_item(&self, item: &T) -> anyhow::Result<MatchResult>;
}

impl<T, M> Matcher<T> for Arc<M>
where
    M: Matcher<T> + ?Sized,
{
    fn query_descriptor(&self) -> QueryDescriptor {
        (**self).query_descriptor()
    }

    fn match_item(&self, item: &T) -> anyhow::Result<MatchResult> {
        (**self).match_item(item)
    }
}

/// Adapts a descriptor and a closure into a [`Matcher`]
pub struct FnMatcher<F> {
    descriptor: QueryDescriptor,
    match_fn: F,
}

impl<F> FnMatcher<F> {
    pub fn new<T>(descriptor: QueryDescriptor, match_fn: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<MatchResult> + Send + Sync,
    {
        Self {
            descriptor,
            match_fn,
        }
    }
}

impl<T, F> Matcher<T> for FnMatcher<F>
where
    F: Fn(&T) -> anyhow::Result<MatchResult> + Send + Sync,
{
    fn query_descriptor(&self) -> QueryDescriptor {
        self.descriptor.clone()
    }

    fn match_item(&self, item: &T) -> anyhow::Result<MatchResult> {
        (self.match_fn)(item)
    }
}
