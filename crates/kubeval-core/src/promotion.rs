//! Promotion of high-scoring responses into the example bank

use crate::bank::{normalize_query, ExampleBank, ExampleSource, ExpertExample};
use crate::error::EvalResult;
use crate::types::EvaluationResult;
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on key points derived from a rationale
pub const MAX_DERIVED_KEY_POINTS: usize = 5;

/// Outcome of [`PromotionRule::maybe_promote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    Promoted { example_id: String },
    /// An example with the same (category, query) key already exists
    Duplicate,
    /// Below threshold or failed item
    NotEligible,
}

impl PromotionOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, PromotionOutcome::Promoted { .. })
    }
}

/// Single writer into the [`ExampleBank`]
pub struct PromotionRule {
    bank: Arc<ExampleBank>,
}

impl PromotionRule {
    pub fn new(bank: Arc<ExampleBank>) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &Arc<ExampleBank> {
        &self.bank
    }

    /// Promote `result` when it passed the threshold and did not fail
    pub fn maybe_promote(&self, result: &EvaluationResult) -> EvalResult<PromotionOutcome> {
        if !result.passed_threshold || result.is_failed() {
            return Ok(PromotionOutcome::NotEligible);
        }

        let example = build_example(result);
        let example_id = example.id.clone();
        if self.bank.add_if_absent(example)? {
            info!(
                example_id = %example_id,
                category = %result.category,
                overall = result.score.overall,
                "Promoted response into example bank"
            );
            Ok(PromotionOutcome::Promoted { example_id })
        } else {
            debug!(query_id = %result.query.id, "Promotion skipped, example already present");
            Ok(PromotionOutcome::Duplicate)
        }
    }
}

fn build_example(result: &EvaluationResult) -> ExpertExample {
    let rationale = result.score.rationale.trim();
    ExpertExample {
        id: promoted_id(result),
        category: result.category,
        query_text: result.query.text.clone(),
        expert_response: result.response.text.clone(),
        expert_reasoning: (!rationale.is_empty()).then(|| rationale.to_string()),
        key_points: derive_key_points(result),
        quality_score: Some(result.score.overall),
        source: ExampleSource::Promoted,
    }
}

/// `promoted-{category}-{query id}-{hash}`; the hash keeps ids unique when
/// datasets reuse a query id for different questions
fn promoted_id(result: &EvaluationResult) -> String {
    format!(
        "promoted-{}-{}-{:08x}",
        result.category,
        result.query.id,
        fnv1a32(normalize_query(&result.query.text).as_bytes())
    )
}

/// 32-bit FNV-1a, stable across builds so persisted ids stay the same
fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5_u32, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

/// Reference key points if supplied, else rationale sentences, else the response's first sentence
pub fn derive_key_points(result: &EvaluationResult) -> Vec<String> {
    if let Some(reference) = result.reference.as_ref().filter(|r| !r.key_points.is_empty()) {
        return reference.key_points.clone();
    }

    let from_rationale = sentences(&result.score.rationale, MAX_DERIVED_KEY_POINTS);
    if !from_rationale.is_empty() {
        return from_rationale;
    }

    sentences(&result.response.text, 1)
}

fn sentences(text: &str, limit: usize) -> Vec<String> {
    text.split(['.', '\n'])
        .map(|s| s.trim().trim_start_matches(['-', '*']).trim())
        .filter(|s| s.len() > 3)
        .take(limit)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::error::ErrorKind;
    use crate::types::{
        AgentResponse, ItemFailure, Query, Reference, ScorePayload, ScoreWeights, StrategyKind,
    };
    use chrono::Utc;

    fn result(query: &str, overall: f64, threshold: f64) -> EvaluationResult {
        let mut score = ScorePayload::new(
            overall,
            overall,
            overall,
            "Identifies the memory limit. Suggests profiling.\nMentions JVM heap",
            &ScoreWeights::default(),
        );
        score.overall = overall;
        EvaluationResult {
            query: Query::new("tc_001", query).with_category(Category::ErrorAnalysis),
            response: AgentResponse::new("tc_001", "Raise the memory limit. Then profile."),
            reference: None,
            category: Category::ErrorAnalysis,
            strategy_used: StrategyKind::PureModel,
            score,
            passed_threshold: overall >= threshold,
            attempts: 1,
            examples_used: 0,
            error: None,
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let rule = PromotionRule::new(Arc::new(ExampleBank::new()));

        let at = result("Pod OOMKilled", 0.8, 0.8);
        assert!(rule.maybe_promote(&at).unwrap().is_promoted());

        let below = result("Pod evicted", 0.79999, 0.8);
        assert_eq!(rule.maybe_promote(&below).unwrap(), PromotionOutcome::NotEligible);
        assert_eq!(rule.bank().len(), 1);
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let rule = PromotionRule::new(Arc::new(ExampleBank::new()));
        let r = result("Pod OOMKilled", 0.9, 0.8);

        assert!(rule.maybe_promote(&r).unwrap().is_promoted());
        assert_eq!(rule.maybe_promote(&r).unwrap(), PromotionOutcome::Duplicate);
        assert_eq!(rule.bank().examples_for(Category::ErrorAnalysis).len(), 1);
    }

    #[test]
    fn test_failed_items_are_not_promoted() {
        let rule = PromotionRule::new(Arc::new(ExampleBank::new()));
        let mut r = result("Pod OOMKilled", 0.9, 0.8);
        r.error = Some(ItemFailure {
            kind: ErrorKind::ScoreParse,
            message: "bad".into(),
        });

        assert_eq!(rule.maybe_promote(&r).unwrap(), PromotionOutcome::NotEligible);
        assert!(rule.bank().is_empty());
    }

    #[test]
    fn test_promoted_example_contents() {
        let bank = Arc::new(ExampleBank::new());
        let rule = PromotionRule::new(bank.clone());
        rule.maybe_promote(&result("Pod OOMKilled", 0.85, 0.8)).unwrap();

        let stored = bank.examples_for(Category::ErrorAnalysis);
        let example = &stored[0];
        assert!(example.id.starts_with("promoted-error_analysis-tc_001-"));
        assert_eq!(example.id.len(), "promoted-error_analysis-tc_001-".len() + 8);
        assert_eq!(example.source, ExampleSource::Promoted);
        assert_eq!(example.quality_score, Some(0.85));
        assert_eq!(
            example.key_points,
            vec!["Identifies the memory limit", "Suggests profiling", "Mentions JVM heap"]
        );
    }

    #[test]
    fn test_reused_query_id_gets_distinct_examples() {
        let bank = Arc::new(ExampleBank::new());
        let rule = PromotionRule::new(bank.clone());

        let first = rule.maybe_promote(&result("Pod OOMKilled", 0.9, 0.8)).unwrap();
        let evicted = result("Pod evicted for disk pressure", 0.9, 0.8);
        let second = rule.maybe_promote(&evicted).unwrap();
        assert!(first.is_promoted());
        assert!(second.is_promoted());
        assert_ne!(first, second);
        assert_eq!(bank.examples_for(Category::ErrorAnalysis).len(), 2);

        // case and spacing do not change the id
        assert_eq!(
            promoted_id(&result("Pod OOMKilled", 0.9, 0.8)),
            promoted_id(&result("  pod   oomkilled ", 0.9, 0.8))
        );
    }

    #[test]
    fn test_fnv1a32_known_values() {
        assert_eq!(fnv1a32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a32(b"a"), 0xe40c_292c);
    }

    #[test]
    fn test_reference_key_points_take_precedence() {
        let mut r = result("Pod OOMKilled", 0.9, 0.8);
        r.reference = Some(Reference {
            expected_answer: "Increase limits".into(),
            key_points: vec!["memory limits".into()],
            acceptable_variations: vec![],
        });
        assert_eq!(derive_key_points(&r), vec!["memory limits"]);
    }

    #[test]
    fn test_falls_back_to_response_sentence() {
        let mut r = result("Pod OOMKilled", 0.9, 0.8);
        r.score.rationale = String::new();
        assert_eq!(derive_key_points(&r), vec!["Raise the memory limit"]);
    }
}
