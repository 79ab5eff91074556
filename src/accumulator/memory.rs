//! In-memory result accumulator.

use parking_lot::Mutex;
use std::collections::HashSet;

use crate::accumulator::ResultAccumulator;
use crate::error::Result;
use crate::models::MatchResult;
use crate::query::QueryDescriptor;

/// Results held in completion order behind a single mutex. Nothing persisted.
#[derive(Debug)]
pub struct InMemoryAccumulator {
    descriptor: QueryDescriptor,
    results: Mutex<Vec<MatchResult>>,
}

impl InMemoryAccumulator {
    pub fn new(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            results: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of results in the order workers completed them
    pub fn results(&self) -> Vec<MatchResult> {
        self.results.lock().clone()
    }

    pub fn into_results(self) -> Vec<MatchResult> {
        self.results.into_inner()
    }
}

impl ResultAccumulator for InMemoryAccumulator {
    fn add_result(&self, result: MatchResult) -> Result<()> {
        self.results.lock().push(result);
        Ok(())
    }

    fn completed_ids(&self) -> HashSet<String> {
        self.results
            .lock()
            .iter()
            .map(|result| result.item_id.clone())
            .collect()
    }

    fn n_completed(&self) -> usize {
        self.results.lock().len()
    }

    fn query_descriptor(&self) -> QueryDescriptor {
        self.descriptor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_results_keep_completion_order() {
        let accumulator = InMemoryAccumulator::new(QueryDescriptor::new());
        for id in ["b", "a", "c"] {
            accumulator
                .add_result(MatchResult::new(id, 1, 0.5, vec![]))
                .unwrap();
        }

        let ids: Vec<String> = accumulator
            .results()
            .into_iter()
            .map(|r| r.item_id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(accumulator.n_completed(), 3);
    }

    #[test]
    fn test_completed_ids_snapshot_is_detached() {
        let accumulator = InMemoryAccumulator::new(QueryDescriptor::new());
        accumulator
            .add_result(MatchResult::new("a", 1, 0.5, vec![]))
            .unwrap();

        let snapshot = accumulator.completed_ids();
        accumulator
            .add_result(MatchResult::new("b", 1, 0.5, vec![]))
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(accumulator.completed_ids().len(), 2);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let accumulator = Arc::new(InMemoryAccumulator::new(QueryDescriptor::new()));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let accumulator = Arc::clone(&accumulator);
                thread::spawn(move || {
                    for i in 0..50 {
                        accumulator
                            .add_result(MatchResult::new(format!("{t}-{i}"), 1, 0.1, vec![]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(accumulator.n_completed(), 400);
        assert_eq!(accumulator.completed_ids().len(), 400);
    }

    #[test]
    fn test_descriptor_is_returned_as_copy() {
        let descriptor = QueryDescriptor::new().with("rows", 1);
        let accumulator = InMemoryAccumulator::new(descriptor.clone());
        let mut copy = accumulator.query_descriptor();
        copy.add("rows", 2);

        assert_eq!(accumulator.query_descriptor(), descriptor);
    }
}
