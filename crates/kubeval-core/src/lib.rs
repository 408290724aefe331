//! Evaluation engine for Kubernetes / search-cluster support agents.
//!
//! Takes (query, agent response, optional reference) items, classifies each
//! query, scores it with one of three interchangeable strategies, aggregates
//! per-category statistics and promotes high scorers into a shared few-shot
//! example bank.
//!
//! ```ignore
//! let bank = Arc::new(load_example_dir(&dir, DedupPolicy::Normalized)?);
//! let system = EvaluationSystem::from_config(&config, bank, Some(client))?;
//! let report = system.evaluate_batch(items).await;
//! write_report_json(&out, &report)?;
//! ```

pub mod aggregator;
pub mod bank;
pub mod category;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod loader;
pub mod promotion;
pub mod prompt;
pub mod report;
pub mod scoring;
pub mod system;
pub mod types;

pub use aggregator::Aggregator;
pub use bank::{DedupPolicy, ExampleBank, ExampleSource, ExpertExample};
pub use category::Category;
pub use classifier::QueryClassifier;
pub use config::{EvaluatorType, ModelConfig, RetryConfig, RunConfig};
pub use dataset::{Dataset, TestCase};
pub use engine::{passes_threshold, EngineSettings, EvaluationEngine, RetryPolicy};
pub use error::{ErrorKind, EvalError, EvalResult};
pub use loader::{load_example_dir, load_example_file, write_example_dir};
pub use promotion::{PromotionOutcome, PromotionRule};
pub use report::{
    read_report_json, write_report_json, CategoryStats, EvaluationReport, OverallStats,
    RunMetadata, ScoreDistribution, ScoreStats,
};
pub use scoring::{JudgeSettings, ScoreModel, ScoreRequest, ScoringStrategy};
pub use system::EvaluationSystem;
pub use types::{
    AgentResponse, EvaluationItem, EvaluationResult, ItemFailure, Query, Reference,
    ScorePayload, ScoreWeights, StrategyKind,
};

pub use tokio_util::sync::CancellationToken;
