//! Batch evaluation façade

use crate::aggregator::Aggregator;
use crate::bank::ExampleBank;
use crate::config::{EvaluatorType, RunConfig};
use crate::engine::{EngineSettings, EvaluationEngine};
use crate::error::EvalResult;
use crate::promotion::{PromotionOutcome, PromotionRule};
use crate::report::{EvaluationReport, RunMetadata};
use crate::scoring::ScoringStrategy;
use crate::types::EvaluationItem;
use futures::stream::{self, StreamExt};
use kubeval_llm::CompletionClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wires engine, promotion and aggregation together for batch runs
pub struct EvaluationSystem {
    engine: EvaluationEngine,
    promotion: PromotionRule,
    evaluator_type: EvaluatorType,
    concurrency: usize,
    label: Option<String>,
}

impl EvaluationSystem {
    pub fn new(
        engine: EvaluationEngine,
        bank: Arc<ExampleBank>,
        evaluator_type: EvaluatorType,
    ) -> Self {
        Self {
            engine,
            promotion: PromotionRule::new(bank),
            evaluator_type,
            concurrency: 1,
            label: None,
        }
    }

    /// Validate `config` and build the strategy, engine and promotion rule
    pub fn from_config(
        config: &RunConfig,
        bank: Arc<ExampleBank>,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> EvalResult<Self> {
        config.validate()?;
        let strategy =
            ScoringStrategy::build(config.evaluator_type, client, config.model.judge_settings())?;
        let engine = EvaluationEngine::new(strategy, bank.clone())
            .with_settings(EngineSettings::from(config));

        Ok(Self::new(engine, bank, config.evaluator_type).with_concurrency(config.concurrency))
    }

    /// Maximum items scored at once
    ///
    /// Strategies that read the example bank always run one item at a time:
    /// an item's examples are selected only after every earlier item has been
    /// promoted (or not).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        let requested = concurrency.max(1);
        self.concurrency = if requested > 1 && self.engine.uses_examples() {
            warn!(
                requested,
                "Example-grounded scoring depends on earlier promotions, running sequentially"
            );
            1
        } else {
            requested
        };
        self
    }

    /// Free-form label recorded in run metadata (e.g. agent quality level)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    pub fn bank(&self) -> &Arc<ExampleBank> {
        self.promotion.bank()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Evaluate every item to completion
    pub async fn evaluate_batch(&self, items: Vec<EvaluationItem>) -> EvaluationReport {
        self.evaluate_batch_with_cancel(items, CancellationToken::new()).await
    }

    /// Evaluate items until done or `cancel` fires
    ///
    /// Results are reported in input order. On cancellation in-flight items
    /// are dropped and the report holds the completed prefix.
    pub async fn evaluate_batch_with_cancel(
        &self,
        items: Vec<EvaluationItem>,
        cancel: CancellationToken,
    ) -> EvaluationReport {
        let total = items.len();
        let mut metadata = RunMetadata::start(
            self.evaluator_type,
            self.engine.settings().promotion_threshold,
            total,
        );
        if let Some(label) = &self.label {
            metadata = metadata.with_label(label.clone());
        }
        info!(
            run_id = %metadata.run_id,
            items = total,
            evaluator = %self.evaluator_type,
            concurrency = self.concurrency,
            "Starting evaluation batch"
        );

        let engine = &self.engine;
        let results = stream::iter(items)
            .map(|item| async move { engine.evaluate(&item).await })
            .buffered(self.concurrency);
        let mut results = std::pin::pin!(results);

        let mut aggregator = Aggregator::new();
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = results.next() => next,
            };
            let Some(result) = next else {
                break;
            };

            // promotion and aggregation run here, one item at a time, in input order
            match self.promotion.maybe_promote(&result) {
                Ok(PromotionOutcome::Promoted { .. }) => aggregator.record_promotion(),
                Ok(_) => {}
                Err(e) => warn!(query_id = %result.query.id, error = %e, "Promotion rejected"),
            }
            aggregator.add(result);
        }

        if cancelled {
            warn!(
                completed = aggregator.len(),
                requested = total,
                "Evaluation batch cancelled"
            );
        }
        metadata.cancelled = cancelled;

        let report = aggregator.finalize(metadata);
        info!(
            run_id = %report.metadata.run_id,
            scored = report.overall.scored,
            failed = report.overall.failed,
            promoted = report.overall.promoted,
            "Evaluation batch finished"
        );
        report
    }
}
