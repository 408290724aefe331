//! YAML test-case datasets

use crate::category::Category;
use crate::error::{EvalError, EvalResult};
use crate::types::{AgentResponse, EvaluationItem, Query, Reference};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// One dataset entry: a query with optional ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub id: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TestCase {
    pub fn to_query(&self) -> Query {
        Query {
            id: self.id.clone(),
            text: self.query.clone(),
            category: self.category,
            context: self.context.clone(),
        }
    }

    /// Pair this case with an agent response
    pub fn into_item(self, response: AgentResponse) -> EvaluationItem {
        let query = self.to_query();
        EvaluationItem {
            query,
            response,
            reference: self.reference,
        }
    }
}

/// A named collection of test cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub test_cases: Vec<TestCase>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Dataset {
    pub fn from_yaml_str(content: &str) -> EvalResult<Self> {
        let dataset: Dataset = serde_yaml::from_str(content)
            .map_err(|e| EvalError::Validation(format!("Invalid dataset: {}", e)))?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Load and validate a dataset file
    pub fn load(path: &Path) -> EvalResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EvalError::Configuration(format!("Failed to read dataset {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_yaml_str(&content).map_err(|e| match e {
            EvalError::Validation(msg) => {
                EvalError::Validation(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!(
            dataset = %dataset.name,
            cases = dataset.test_cases.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Unique non-empty ids, non-empty queries, references with key points
    pub fn validate(&self) -> EvalResult<()> {
        let mut seen = HashSet::new();
        for (index, case) in self.test_cases.iter().enumerate() {
            if case.id.trim().is_empty() {
                return Err(EvalError::Validation(format!(
                    "test_cases[{}]: id must not be empty",
                    index
                )));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(EvalError::Validation(format!(
                    "test_cases[{}]: duplicate id '{}'",
                    index, case.id
                )));
            }
            if case.query.trim().is_empty() {
                return Err(EvalError::Validation(format!(
                    "test_cases[{}] ({}): query must not be empty",
                    index, case.id
                )));
            }
            if let Some(reference) = &case.reference {
                if reference.key_points.iter().all(|p| p.trim().is_empty()) {
                    return Err(EvalError::Validation(format!(
                        "test_cases[{}] ({}): reference needs at least one key point",
                        index, case.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// First `n` cases, keeping order
    pub fn sample(&self, n: usize) -> Vec<TestCase> {
        self.test_cases.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"
name: k8s-search-agent
description: Reference questions
test_cases:
  - id: tc_001
    query: "My pod is in CrashLoopBackOff state. The logs show 'OOMKilled'."
    category: error_analysis
    context:
      cluster_size: 12
      k8s_version: "1.28"
    reference:
      expected_answer: "Increase memory limits"
      key_points: ["memory limits", "JVM heap"]
  - id: tc_002
    query: "How can I optimize search performance?"
"#;

    #[test]
    fn test_parse_dataset() {
        let dataset = Dataset::from_yaml_str(DATASET).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.version, "1.0.0");

        let first = &dataset.test_cases[0];
        assert_eq!(first.category, Some(Category::ErrorAnalysis));
        assert_eq!(first.context["cluster_size"], serde_json::json!(12));
        assert!(dataset.test_cases[1].reference.is_none());
    }

    #[test]
    fn test_into_item() {
        let dataset = Dataset::from_yaml_str(DATASET).unwrap();
        let case = dataset.test_cases[0].clone();
        let item = case.into_item(AgentResponse::new("tc_001", "Raise limits"));

        assert_eq!(item.query.id, "tc_001");
        assert_eq!(item.query.category, Some(Category::ErrorAnalysis));
        assert_eq!(item.reference.unwrap().key_points.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = "name: d\ntest_cases:\n  - id: a\n    query: q\n  - id: a\n    query: q2\n";
        let err = Dataset::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate id"));
    }

    #[test]
    fn test_missing_query_rejected() {
        let yaml = "name: d\ntest_cases:\n  - id: a\n";
        let err = Dataset::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, EvalError::Validation(_)));
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let yaml = "name: d\ntest_cases:\n  - id: a\n    query: q\n    category: networking\n";
        assert!(matches!(Dataset::from_yaml_str(yaml), Err(EvalError::Validation(_))));
    }

    #[test]
    fn test_sample_keeps_order() {
        let dataset = Dataset::from_yaml_str(DATASET).unwrap();
        let sample = dataset.sample(1);
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].id, "tc_001");
        assert_eq!(dataset.sample(10).len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.yaml");
        std::fs::write(&path, DATASET).unwrap();
        assert_eq!(Dataset::load(&path).unwrap().len(), 2);

        let err = Dataset::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }
}
