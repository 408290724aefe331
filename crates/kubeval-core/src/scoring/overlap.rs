//! Reference-overlap scoring for externally tracked runs
//!
//! Scores come from comparing the response with the item's reference and
//! query text. No model call is made.

use super::{ScoreModel, ScoreRequest};
use crate::error::EvalResult;
use crate::types::{ScorePayload, StrategyKind};
use async_trait::async_trait;
use std::collections::HashSet;

/// Accuracy and completeness reported when an item has no reference
pub const NO_REFERENCE_SCORE: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "what", "when", "where", "which", "how",
    "why", "does", "are", "was", "were", "can", "should", "would", "could", "have", "has",
    "into", "from", "about", "your", "you", "my", "our", "is", "do", "in", "of", "to", "a",
    "an", "on", "it", "i", "me", "we",
];

/// Heuristic scorer based on key-point coverage and query-term overlap
#[derive(Debug, Clone, Default)]
pub struct ReferenceOverlapScoreModel;

impl ReferenceOverlapScoreModel {
    pub fn new() -> Self {
        Self
    }

    /// Fraction of significant query terms found in the response, doubled and capped at 1
    pub fn relevance(query: &str, response: &str) -> f64 {
        let query_terms = significant_terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let response_terms = significant_terms(response);
        let overlap = query_terms.intersection(&response_terms).count() as f64
            / query_terms.len() as f64;
        (overlap * 2.0).min(1.0)
    }

    /// Split key points into (covered, missing), matching case-insensitively
    pub fn coverage<'a>(key_points: &'a [String], response: &str) -> (Vec<&'a str>, Vec<&'a str>) {
        let lowered = response.to_lowercase();
        key_points
            .iter()
            .map(String::as_str)
            .partition(|point| lowered.contains(&point.trim().to_lowercase()))
    }
}

#[async_trait]
impl ScoreModel for ReferenceOverlapScoreModel {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExternallyTracked
    }

    async fn score(&self, request: &ScoreRequest<'_>) -> EvalResult<ScorePayload> {
        let relevance = Self::relevance(&request.query.text, &request.response.text);

        let Some(reference) = request.reference.filter(|r| !r.key_points.is_empty()) else {
            return Ok(ScorePayload::new(
                NO_REFERENCE_SCORE,
                relevance,
                NO_REFERENCE_SCORE,
                "No reference key points available; accuracy and completeness are neutral",
                request.weights,
            ));
        };

        let (covered, missing) = Self::coverage(&reference.key_points, &request.response.text);
        let coverage = covered.len() as f64 / reference.key_points.len() as f64;

        let rationale = if missing.is_empty() {
            format!("Covers all {} reference key points", covered.len())
        } else {
            format!(
                "Covers {}/{} reference key points. Missing: {}",
                covered.len(),
                reference.key_points.len(),
                missing.join("; ")
            )
        };

        Ok(
            ScorePayload::new(coverage, relevance, coverage, rationale, request.weights)
                .with_missing_points(missing.into_iter().map(str::to_string).collect()),
        )
    }
}

fn significant_terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}
