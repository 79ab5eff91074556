//! # Match Results
//!
//! One [`MatchResult`] is produced per successfully matched work item. Each
//! carries the ranked [`Candidate`]s returned by the search backend.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Outcome of matching a single work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Id of the work item that was matched
    pub item_id: String,
    /// Backend-reported query time in milliseconds
    pub query_time_ms: i64,
    pub max_score: f32,
    /// Candidates in backend rank order
    pub candidates: Vec<Candidate>,
}

impl MatchResult {
    pub fn new(
        item_id: impl Into<String>,
        query_time_ms: i64,
        max_score: f32,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            query_time_ms,
            max_score,
            candidates,
        }
    }

    /// Best-scoring candidate, if any
    pub fn best_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// A record returned by the backend as a potential match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub matched_record_id: String,
    pub score: f32,
    /// Backend relevance explanation, empty when not requested
    #[serde(default)]
    pub explanation: String,

    #[serde(skip)]
    contributions: OnceLock<HashMap<String, f32>>,
}

impl Candidate {
    pub fn new(matched_record_id: impl Into<String>, score: f32) -> Self {
        Self::with_explanation(matched_record_id, score, String::new())
    }

    pub fn with_explanation(
        matched_record_id: impl Into<String>,
        score: f32,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            matched_record_id: matched_record_id.into(),
            score,
            explanation: explanation.into(),
            contributions: OnceLock::new(),
        }
    }

    /// Per-field share of the score, summed from the explanation's
    /// `<value> = (MATCH) weight(<field>:<term>` clauses. Computed once.
    pub fn field_score_contributions(&self) -> &HashMap<String, f32> {
        self.contributions
            .get_or_init(|| parse_field_contributions(&self.explanation))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.matched_record_id == other.matched_record_id
            && self.score == other.score
            && self.explanation == other.explanation
    }
}

fn explain_field_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([^\s]+) = \(MATCH\) weight\(([^:]+):([^\s]+)")
            .expect("explanation pattern is valid")
    })
}

fn parse_field_contributions(explanation: &str) -> HashMap<String, f32> {
    let mut contributions: HashMap<String, f32> = HashMap::new();
    for caps in explain_field_regex().captures_iter(explanation) {
        let Ok(value) = caps[1].parse::<f32>() else {
            continue;
        };
        *contributions.entry(caps[2].to_string()).or_insert(0.0) += value;
    }
    contributions
}
