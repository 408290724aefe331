//! Scoring strategies
//!
//! A [`ScoringStrategy`] is resolved once per run from the configured
//! [`EvaluatorType`] and never changes mid-run.

pub mod judge;
pub mod overlap;
pub mod parse;

pub use judge::{ExampleGroundedScoreModel, JudgeSettings, ModelJudge, PureModelScoreModel};
pub use overlap::ReferenceOverlapScoreModel;
pub use parse::{parse_scores, ParsedScores};

use crate::bank::ExpertExample;
use crate::category::Category;
use crate::config::EvaluatorType;
use crate::error::{EvalError, EvalResult};
use crate::types::{AgentResponse, Query, Reference, ScorePayload, ScoreWeights, StrategyKind};
use async_trait::async_trait;
use kubeval_llm::CompletionClient;
use std::sync::Arc;

/// Everything a score model may look at for one item
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub query: &'a Query,
    pub response: &'a AgentResponse,
    pub reference: Option<&'a Reference>,
    pub category: Category,
    pub examples: &'a [Arc<ExpertExample>],
    pub weights: &'a ScoreWeights,
}

/// Produces a [`ScorePayload`] for a (query, response) pair
#[async_trait]
pub trait ScoreModel: Send + Sync {
    /// Strategy reported on results scored by this model
    fn kind(&self) -> StrategyKind;

    /// Score a single item, making at most one external call
    async fn score(&self, request: &ScoreRequest<'_>) -> EvalResult<ScorePayload>;
}

/// The closed set of scoring strategies
pub enum ScoringStrategy {
    ExampleGrounded(ExampleGroundedScoreModel),
    PureModel(PureModelScoreModel),
    ExternallyTracked(ReferenceOverlapScoreModel),
}

impl ScoringStrategy {
    /// Resolve the strategy for an evaluator type
    ///
    /// Model-backed strategies require a completion client.
    pub fn build(
        evaluator: EvaluatorType,
        client: Option<Arc<dyn CompletionClient>>,
        settings: JudgeSettings,
    ) -> EvalResult<Self> {
        let require_client = || {
            client.clone().ok_or_else(|| {
                EvalError::Configuration(format!(
                    "Evaluator '{}' requires a model endpoint but none is configured",
                    evaluator
                ))
            })
        };

        Ok(match evaluator {
            EvaluatorType::FileBased => ScoringStrategy::ExampleGrounded(
                ExampleGroundedScoreModel::new(ModelJudge::new(require_client()?, settings)),
            ),
            EvaluatorType::Llm => ScoringStrategy::PureModel(PureModelScoreModel::new(
                ModelJudge::new(require_client()?, settings),
            )),
            EvaluatorType::ExternallyTracked => {
                ScoringStrategy::ExternallyTracked(ReferenceOverlapScoreModel::new())
            }
        })
    }

    /// Whether examples should be fetched from the bank for this strategy
    pub fn uses_examples(&self) -> bool {
        matches!(self, ScoringStrategy::ExampleGrounded(_))
    }

    /// Strategy actually applied given whether any examples were found
    pub fn effective_kind(&self, examples_available: bool) -> StrategyKind {
        match self {
            ScoringStrategy::ExampleGrounded(_) if !examples_available => StrategyKind::PureModel,
            other => other.model().kind(),
        }
    }

    fn model(&self) -> &dyn ScoreModel {
        match self {
            ScoringStrategy::ExampleGrounded(m) => m,
            ScoringStrategy::PureModel(m) => m,
            ScoringStrategy::ExternallyTracked(m) => m,
        }
    }
}

#[async_trait]
impl ScoreModel for ScoringStrategy {
    fn kind(&self) -> StrategyKind {
        self.model().kind()
    }

    async fn score(&self, request: &ScoreRequest<'_>) -> EvalResult<ScorePayload> {
        self.model().score(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_strategies_require_client() {
        let err = ScoringStrategy::build(EvaluatorType::Llm, None, JudgeSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::Configuration(_)));

        let err = ScoringStrategy::build(EvaluatorType::FileBased, None, JudgeSettings::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("file_based"));
    }

    #[test]
    fn test_externally_tracked_needs_no_client() {
        let strategy = ScoringStrategy::build(
            EvaluatorType::ExternallyTracked,
            None,
            JudgeSettings::default(),
        )
        .unwrap();
        assert_eq!(strategy.kind(), StrategyKind::ExternallyTracked);
        assert!(!strategy.uses_examples());
        assert_eq!(strategy.effective_kind(false), StrategyKind::ExternallyTracked);
    }
}
