//! Evaluation engine: classify, score with retry, recompute, threshold

use crate::bank::ExampleBank;
use crate::category::Category;
use crate::classifier::QueryClassifier;
use crate::config::{RetryConfig, RunConfig};
use crate::error::{EvalError, EvalResult};
use crate::scoring::{ScoreModel, ScoreRequest, ScoringStrategy};
use crate::types::{
    EvaluationItem, EvaluationResult, ItemFailure, ScorePayload, ScoreWeights, StrategyKind,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Bounded exponential backoff for model invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before retrying after the given 1-based failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// `overall >= threshold`, inclusive
pub fn passes_threshold(overall: f64, threshold: f64) -> bool {
    overall >= threshold
}

/// Engine tunables
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub promotion_threshold: f64,
    pub max_examples: usize,
    pub weights: ScoreWeights,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            promotion_threshold: 0.8,
            max_examples: 3,
            weights: ScoreWeights::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&RunConfig> for EngineSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            promotion_threshold: config.promotion_threshold,
            max_examples: config.max_examples,
            weights: config.weights,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Scores single items; never mutates the example bank
pub struct EvaluationEngine {
    classifier: QueryClassifier,
    strategy: ScoringStrategy,
    bank: Arc<ExampleBank>,
    settings: EngineSettings,
}

impl EvaluationEngine {
    pub fn new(strategy: ScoringStrategy, bank: Arc<ExampleBank>) -> Self {
        Self {
            classifier: QueryClassifier::new(),
            strategy,
            bank,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_classifier(mut self, classifier: QueryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Whether scoring reads few-shot examples from the bank
    pub fn uses_examples(&self) -> bool {
        self.strategy.uses_examples()
    }

    /// Declared category if present, else classifier output
    pub fn category_for(&self, item: &EvaluationItem) -> Category {
        item.query
            .category
            .unwrap_or_else(|| self.classifier.classify(&item.query.text))
    }

    /// Evaluate one item; failures become a zero-scored result with an error marker
    pub async fn evaluate(&self, item: &EvaluationItem) -> EvaluationResult {
        let category = self.category_for(item);
        let examples = if self.strategy.uses_examples() {
            self.bank
                .select_for(category, &item.query.text, self.settings.max_examples)
        } else {
            Vec::new()
        };
        let strategy_used = self.strategy.effective_kind(!examples.is_empty());

        let request = ScoreRequest {
            query: &item.query,
            response: &item.response,
            reference: item.reference.as_ref(),
            category,
            examples: &examples,
            weights: &self.settings.weights,
        };

        let (outcome, attempts) = self.score_with_retry(&request).await;

        let (score, passed_threshold, error) = match outcome {
            Ok(payload) => {
                let payload = payload.reweighted(&self.settings.weights);
                let passed = passes_threshold(payload.overall, self.settings.promotion_threshold);
                debug!(
                    query_id = %item.query.id,
                    category = %category,
                    overall = payload.overall,
                    passed,
                    "Scored item"
                );
                (payload, passed, None)
            }
            Err(e) => {
                error!(
                    query_id = %item.query.id,
                    category = %category,
                    attempts,
                    error = %e,
                    "Evaluation failed"
                );
                (
                    ScorePayload::zeroed(format!("Evaluation failed: {}", e)),
                    false,
                    Some(ItemFailure::from(&e)),
                )
            }
        };

        let mut query = item.query.clone();
        query.category = Some(category);

        EvaluationResult {
            query,
            response: item.response.clone(),
            reference: item.reference.clone(),
            category,
            strategy_used,
            score,
            passed_threshold,
            attempts,
            examples_used: examples.len(),
            error,
            evaluated_at: Utc::now(),
        }
    }

    /// Score, retrying retriable invocation errors; returns the outcome and attempts made
    async fn score_with_retry(
        &self,
        request: &ScoreRequest<'_>,
    ) -> (EvalResult<ScorePayload>, u32) {
        let policy = self.settings.retry;
        let mut attempt = 1;
        loop {
            match self.strategy.score(request).await {
                Ok(payload) => {
                    if attempt > 1 {
                        info!(
                            query_id = %request.query.id,
                            attempt,
                            "Scoring succeeded after retry"
                        );
                    }
                    return (Ok(payload), attempt);
                }
                Err(e) if e.is_retriable() && attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        query_id = %request.query.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model invocation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e @ EvalError::ModelInvocation { .. }) => {
                    return (Err(e.with_attempts(attempt)), attempt);
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}
