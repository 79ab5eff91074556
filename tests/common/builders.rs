//! Shared builders for batch run tests: item lists, descriptors, and a
//! matcher that records every call it receives.

use anyhow::anyhow;
use batchmatch_core::{Candidate, IndexedId, MatchResult, Matcher, QueryDescriptor};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `i1`..=`in`
pub fn items(n: usize) -> Vec<IndexedId> {
    (1..=n).map(|i| IndexedId::new(format!("i{i}"))).collect()
}

pub fn test_descriptor() -> QueryDescriptor {
    QueryDescriptor::new()
        .with("qt", "/mlt")
        .with("fl", "score")
        .with("rows", 1)
        .with("mlt.fl", "collectors,location")
}

/// Matcher double that records what it was asked to match
#[derive(Clone)]
pub struct RecordingMatcher {
    descriptor: QueryDescriptor,
    calls: Arc<Mutex<Vec<String>>>,
    fail_on: Arc<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingMatcher {
    pub fn new() -> Self {
        Self::with_descriptor(test_descriptor())
    }

    pub fn with_descriptor(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_on: Arc::new(HashSet::new()),
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail whenever one of `ids` is matched
    pub fn failing_on(mut self, ids: &[&str]) -> Self {
        self.fail_on = Arc::new(ids.iter().map(|id| id.to_string()).collect());
        self
    }

    /// Hold each match for `delay` so concurrency becomes observable.
    /// Failing items fail after half of it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn called_ids(&self) -> HashSet<String> {
        self.calls.lock().iter().cloned().collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for RecordingMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher<IndexedId> for RecordingMatcher {
    fn query_descriptor(&self) -> QueryDescriptor {
        self.descriptor.clone()
    }

    fn match_item(&self, item: &IndexedId) -> anyhow::Result<MatchResult> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push(item.id.clone());

        // Failing items give up halfway, while their neighbours are still running
        let failing = self.fail_on.contains(&item.id);
        if let Some(delay) = self.delay {
            std::thread::sleep(if failing { delay / 2 } else { delay });
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if failing {
            return Err(anyhow!("search backend unavailable for {}", item.id));
        }
        Ok(MatchResult::new(
            item.id.clone(),
            10,
            1.0,
            vec![Candidate::new(format!("{}-match", item.id), 1.0)],
        ))
    }
}
