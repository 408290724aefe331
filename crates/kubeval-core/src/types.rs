//! Core evaluation data types

use crate::category::Category;
use crate::error::{EvalError, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user question posed to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Stable identifier (e.g. dataset case id)
    pub id: String,

    /// Free-form question text
    pub text: String,

    /// Declared category; inferred by the classifier when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Extra context shown to the judge (cluster size, versions, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl Query {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Metadata key holding the agent's self-reported confidence in [0, 1]
pub const CONFIDENCE_KEY: &str = "confidence";

/// Agent answer to a [`Query`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub query_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AgentResponse {
    pub fn new(query_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_confidence(self, confidence: f64) -> Self {
        self.with_metadata(CONFIDENCE_KEY, serde_json::json!(confidence))
    }

    /// Self-reported confidence, if the agent supplied a numeric one
    pub fn confidence(&self) -> Option<f64> {
        self.metadata
            .get(CONFIDENCE_KEY)
            .and_then(serde_json::Value::as_f64)
            .filter(|c| c.is_finite())
    }
}

/// Ground truth attached to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub expected_answer: String,
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptable_variations: Vec<String>,
}

/// One unit of work for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub query: Query,
    pub response: AgentResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}

impl EvaluationItem {
    pub fn new(query: Query, response: AgentResponse) -> Self {
        Self {
            query,
            response,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Weights combining the three sub-scores into `overall`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub accuracy: f64,
    pub relevance: f64,
    pub completeness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.4,
            relevance: 0.3,
            completeness: 0.3,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), EvalError> {
        let all = [self.accuracy, self.relevance, self.completeness];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EvalError::Configuration(
                "Score weights must be finite and non-negative".into(),
            ));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(EvalError::Configuration(
                "At least one score weight must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Normalized weighted mean of the sub-scores, rounded to 6 decimals
    pub fn combine(&self, accuracy: f64, relevance: f64, completeness: f64) -> f64 {
        let total = self.accuracy + self.relevance + self.completeness;
        if total <= 0.0 {
            return round6((accuracy + relevance + completeness) / 3.0);
        }
        let weighted = self.accuracy * accuracy
            + self.relevance * relevance
            + self.completeness * completeness;
        round6(clamp_unit(weighted / total))
    }
}

/// Validated score produced by a scoring strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePayload {
    pub accuracy: f64,
    pub relevance: f64,
    pub completeness: f64,
    pub overall: f64,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_points: Vec<String>,
}

impl ScorePayload {
    /// Build a payload from raw sub-scores; values are clamped into [0, 1]
    pub fn new(
        accuracy: f64,
        relevance: f64,
        completeness: f64,
        rationale: impl Into<String>,
        weights: &ScoreWeights,
    ) -> Self {
        let accuracy = clamp_unit(accuracy);
        let relevance = clamp_unit(relevance);
        let completeness = clamp_unit(completeness);
        Self {
            accuracy,
            relevance,
            completeness,
            overall: weights.combine(accuracy, relevance, completeness),
            rationale: rationale.into(),
            missing_points: Vec::new(),
        }
    }

    /// All-zero payload used for failed items
    pub fn zeroed(rationale: impl Into<String>) -> Self {
        Self {
            accuracy: 0.0,
            relevance: 0.0,
            completeness: 0.0,
            overall: 0.0,
            rationale: rationale.into(),
            missing_points: Vec::new(),
        }
    }

    pub fn with_missing_points(mut self, missing_points: Vec<String>) -> Self {
        self.missing_points = missing_points;
        self
    }

    /// Clamp sub-scores and recompute `overall` from them
    pub fn reweighted(mut self, weights: &ScoreWeights) -> Self {
        self.accuracy = clamp_unit(self.accuracy);
        self.relevance = clamp_unit(self.relevance);
        self.completeness = clamp_unit(self.completeness);
        self.overall = weights.combine(self.accuracy, self.relevance, self.completeness);
        self
    }
}

/// Which scoring strategy actually produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExampleGrounded,
    PureModel,
    ExternallyTracked,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::ExampleGrounded => "example_grounded",
            StrategyKind::PureModel => "pure_model",
            StrategyKind::ExternallyTracked => "externally_tracked",
        };
        f.write_str(name)
    }
}

/// Error marker attached to a failed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EvalError> for ItemFailure {
    fn from(err: &EvalError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of evaluating one [`EvaluationItem`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub query: Query,
    pub response: AgentResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    pub category: Category,
    pub strategy_used: StrategyKind,
    pub score: ScorePayload,
    pub passed_threshold: bool,
    pub attempts: u32,
    pub examples_used: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemFailure>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_scored(&self) -> bool {
        self.error.is_none()
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub(crate) fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
