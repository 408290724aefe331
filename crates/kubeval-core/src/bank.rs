//! Curated few-shot example bank
//!
//! The bank is shared between the engine (reader) and the promotion rule
//! (writer). Reads return snapshots so a concurrent insert never tears an
//! in-progress selection.

use crate::category::Category;
use crate::error::{EvalError, EvalResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Token Jaccard similarity at or above which a stored query counts as a near duplicate
pub const NEAR_DUPLICATE_SIMILARITY: f64 = 0.6;

/// Where an example came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleSource {
    #[default]
    Curated,
    Promoted,
}

/// A curated reference answer used to ground judgments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertExample {
    pub id: String,
    pub category: Category,
    pub query_text: String,
    pub expert_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_reasoning: Option<String>,
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub source: ExampleSource,
}

impl ExpertExample {
    /// Check required fields are present and well formed
    pub fn validate(&self) -> EvalResult<()> {
        if self.id.trim().is_empty() {
            return Err(EvalError::Validation("Example id must not be empty".into()));
        }
        if self.query_text.trim().is_empty() {
            return Err(EvalError::Validation(format!(
                "Example '{}' has an empty query_text",
                self.id
            )));
        }
        if self.expert_response.trim().is_empty() {
            return Err(EvalError::Validation(format!(
                "Example '{}' has an empty expert_response",
                self.id
            )));
        }
        if self.key_points.is_empty() || self.key_points.iter().any(|p| p.trim().is_empty()) {
            return Err(EvalError::Validation(format!(
                "Example '{}' must have at least one non-empty key point",
                self.id
            )));
        }
        if let Some(q) = self.quality_score {
            if !(0.0..=1.0).contains(&q) {
                return Err(EvalError::Validation(format!(
                    "Example '{}' quality_score {} is outside [0, 1]",
                    self.id, q
                )));
            }
        }
        Ok(())
    }
}

/// How query texts are compared when deduplicating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Byte-for-byte comparison
    Exact,
    /// Lowercased, punctuation stripped, whitespace collapsed
    #[default]
    Normalized,
}

impl DedupPolicy {
    pub fn key(&self, query_text: &str) -> String {
        match self {
            DedupPolicy::Exact => query_text.to_string(),
            DedupPolicy::Normalized => normalize_query(query_text),
        }
    }
}

impl std::str::FromStr for DedupPolicy {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(DedupPolicy::Exact),
            "normalized" | "normalised" => Ok(DedupPolicy::Normalized),
            other => Err(EvalError::Configuration(format!(
                "Unknown dedup policy '{}'. Expected 'exact' or 'normalized'",
                other
            ))),
        }
    }
}

/// Lowercase, drop punctuation and collapse runs of whitespace
pub fn normalize_query(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_set(text: &str) -> HashSet<String> {
    normalize_query(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the normalized token sets of `a` and `b`
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let a = token_set(a);
    let b = token_set(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Thread-safe store of expert examples keyed by category
#[derive(Debug, Default)]
pub struct ExampleBank {
    examples: RwLock<HashMap<Category, Vec<Arc<ExpertExample>>>>,
    dedup: DedupPolicy,
}

impl ExampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup = policy;
        self
    }

    /// Build a bank from pre-validated examples, rejecting invalid records and duplicate ids
    pub fn from_examples<I>(examples: I, policy: DedupPolicy) -> EvalResult<Self>
    where
        I: IntoIterator<Item = ExpertExample>,
    {
        let bank = Self::new().with_dedup_policy(policy);
        for example in examples {
            bank.add(example)?;
        }
        Ok(bank)
    }

    pub fn dedup_policy(&self) -> DedupPolicy {
        self.dedup
    }

    /// Snapshot of the examples stored for `category`, in insertion order
    pub fn examples_for(&self, category: Category) -> Vec<Arc<ExpertExample>> {
        self.examples
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    /// Insert a validated example; example ids must be unique across the bank
    pub fn add(&self, example: ExpertExample) -> EvalResult<()> {
        example.validate()?;
        let mut guard = self.examples.write();
        if guard.values().flatten().any(|e| e.id == example.id) {
            return Err(EvalError::Validation(format!(
                "Duplicate example id '{}'",
                example.id
            )));
        }
        debug!(id = %example.id, category = %example.category, "Adding example to bank");
        guard
            .entry(example.category)
            .or_default()
            .push(Arc::new(example));
        Ok(())
    }

    /// Insert unless an example with the same (category, query key) already exists
    ///
    /// Check and insert happen under a single write lock. Returns `true` when inserted.
    pub fn add_if_absent(&self, example: ExpertExample) -> EvalResult<bool> {
        example.validate()?;
        let key = self.dedup.key(&example.query_text);

        let mut guard = self.examples.write();
        let duplicate = guard
            .get(&example.category)
            .map(|list| list.iter().any(|e| self.dedup.key(&e.query_text) == key))
            .unwrap_or(false);
        if duplicate {
            return Ok(false);
        }
        if guard.values().flatten().any(|e| e.id == example.id) {
            return Err(EvalError::Validation(format!(
                "Duplicate example id '{}'",
                example.id
            )));
        }

        debug!(id = %example.id, category = %example.category, "Promoting example into bank");
        guard
            .entry(example.category)
            .or_default()
            .push(Arc::new(example));
        Ok(true)
    }

    /// True when an example with the same dedup key exists in `category`
    pub fn contains(&self, category: Category, query_text: &str) -> bool {
        let key = self.dedup.key(query_text);
        self.examples
            .read()
            .get(&category)
            .map(|list| list.iter().any(|e| self.dedup.key(&e.query_text) == key))
            .unwrap_or(false)
    }

    /// Pick up to `limit` examples for a query
    ///
    /// Ranking: exact normalized match first, then near duplicates, then the
    /// rest. Within a tier higher `quality_score` wins, then insertion order.
    pub fn select_for(
        &self,
        category: Category,
        query_text: &str,
        limit: usize,
    ) -> Vec<Arc<ExpertExample>> {
        if limit == 0 {
            return Vec::new();
        }
        let normalized = normalize_query(query_text);

        let mut ranked: Vec<(u8, f64, usize, Arc<ExpertExample>)> = self
            .examples_for(category)
            .into_iter()
            .enumerate()
            .map(|(index, example)| {
                let tier = if normalize_query(&example.query_text) == normalized {
                    0
                } else if token_similarity(&example.query_text, query_text)
                    >= NEAR_DUPLICATE_SIMILARITY
                {
                    1
                } else {
                    2
                };
                (tier, example.quality_score.unwrap_or(0.0), index, example)
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.total_cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(_, _, _, example)| example)
            .collect()
    }

    /// Total number of examples
    pub fn len(&self) -> usize {
        self.examples.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Example counts per category, in category order
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        self.examples
            .read()
            .iter()
            .map(|(category, list)| (*category, list.len()))
            .collect()
    }

    /// Owned copy of every example grouped by category
    pub fn snapshot(&self) -> BTreeMap<Category, Vec<ExpertExample>> {
        self.examples
            .read()
            .iter()
            .map(|(category, list)| {
                (*category, list.iter().map(|e| e.as_ref().clone()).collect())
            })
            .collect()
    }
}
