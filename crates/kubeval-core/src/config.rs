//! Run configuration
//!
//! Loaded from a TOML file with every field defaulted, then overridden by
//! `OPENAI_*` environment variables and CLI flags.

use crate::bank::DedupPolicy;
use crate::error::{EvalError, EvalResult};
use crate::scoring::JudgeSettings;
use crate::types::ScoreWeights;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "OPENAI_MODEL";

/// Scoring strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorType {
    /// Example-grounded judging against the few-shot bank
    #[default]
    FileBased,
    /// Pure model judging
    Llm,
    /// Reference-overlap scoring tracked by an external system
    ExternallyTracked,
}

impl std::fmt::Display for EvaluatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluatorType::FileBased => write!(f, "file_based"),
            EvaluatorType::Llm => write!(f, "llm"),
            EvaluatorType::ExternallyTracked => write!(f, "externally_tracked"),
        }
    }
}

impl std::str::FromStr for EvaluatorType {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "file_based" | "file" => Ok(EvaluatorType::FileBased),
            "llm" | "model" => Ok(EvaluatorType::Llm),
            "externally_tracked" | "langsmith" => Ok(EvaluatorType::ExternallyTracked),
            _ => Err(EvalError::Configuration(format!(
                "Unknown evaluator type '{}'. Use 'file_based', 'llm' or 'externally_tracked'",
                s
            ))),
        }
    }
}

impl EvaluatorType {
    pub fn requires_model(&self) -> bool {
        !matches!(self, EvaluatorType::ExternallyTracked)
    }
}

/// Completion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn judge_settings(&self) -> JudgeSettings {
        JudgeSettings {
            model: self.model.clone().unwrap_or_default(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Retry settings for model invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// Complete configuration for one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub evaluator_type: EvaluatorType,
    pub promotion_threshold: f64,
    pub concurrency: usize,
    pub max_examples: usize,
    pub dedup_policy: DedupPolicy,
    pub example_dir: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub model: ModelConfig,
    pub retry: RetryConfig,
    pub weights: ScoreWeights,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            evaluator_type: EvaluatorType::default(),
            promotion_threshold: 0.8,
            concurrency: 1,
            max_examples: 3,
            dedup_policy: DedupPolicy::default(),
            example_dir: None,
            dataset_path: None,
            output_dir: None,
            model: ModelConfig::default(),
            retry: RetryConfig::default(),
            weights: ScoreWeights::default(),
        }
    }
}

impl RunConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> EvalResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EvalError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            EvalError::Configuration(msg) => {
                EvalError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> EvalResult<Self> {
        toml::from_str(content).map_err(|e| EvalError::Configuration(e.to_string()))
    }

    /// Apply `OPENAI_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `OPENAI_*` overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_BASE_URL) {
            self.model.base_url = Some(url);
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.model.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model.model = Some(model);
        }
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> EvalResult<()> {
        if !(0.0..=1.0).contains(&self.promotion_threshold) {
            return Err(EvalError::Configuration(format!(
                "promotion_threshold must be within [0, 1], got {}",
                self.promotion_threshold
            )));
        }
        if self.concurrency == 0 {
            return Err(EvalError::Configuration("concurrency must be at least 1".into()));
        }
        if self.max_examples == 0 {
            return Err(EvalError::Configuration("max_examples must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EvalError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(EvalError::Configuration(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        self.weights.validate()?;

        if self.evaluator_type == EvaluatorType::FileBased && self.example_dir.is_none() {
            return Err(EvalError::Configuration(
                "evaluator 'file_based' requires example_dir".into(),
            ));
        }
        if self.evaluator_type == EvaluatorType::FileBased && self.concurrency > 1 {
            return Err(EvalError::Configuration(format!(
                "evaluator 'file_based' requires concurrency = 1, got {}",
                self.concurrency
            )));
        }
        if self.evaluator_type.requires_model() {
            let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
            if missing(&self.model.base_url) {
                return Err(EvalError::Configuration(format!(
                    "evaluator '{}' requires model.base_url (or {})",
                    self.evaluator_type, ENV_BASE_URL
                )));
            }
            if missing(&self.model.model) {
                return Err(EvalError::Configuration(format!(
                    "evaluator '{}' requires model.model (or {})",
                    self.evaluator_type, ENV_MODEL
                )));
            }
        }
        Ok(())
    }
}
