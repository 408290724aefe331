//! Loading and saving the example bank as one YAML file per category
//!
//! ```yaml
//! category: error_analysis
//! description: Pod failures and crash analysis
//! examples:
//!   - id: ea_001
//!     query: "My pod is OOMKilled"
//!     expert_response: "..."
//!     expert_reasoning: "..."
//!     key_points: ["memory limits", "heap sizing"]
//!     quality_score: 0.95
//! ```

use crate::bank::{DedupPolicy, ExampleBank, ExampleSource, ExpertExample};
use crate::category::Category;
use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct ExampleFile {
    category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    examples: Vec<serde_yaml::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExampleRecord {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    query: String,
    expert_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expert_reasoning: Option<String>,
    key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality_score: Option<f64>,
    #[serde(default)]
    source: ExampleSource,
}

/// Every `*.yaml` / `*.yml` file in `dir`, sorted by file name
pub fn example_files(dir: &Path) -> EvalResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EvalError::Configuration(format!(
            "Example directory {} does not exist",
            dir.display()
        )));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_example_file(path: &Path) -> EvalResult<ExampleFile> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        EvalError::Validation(format!("{}: invalid example file: {}", path.display(), e))
    })
}

/// Parse one category file; any malformed record fails the whole file
pub fn load_example_file(path: &Path) -> EvalResult<Vec<ExpertExample>> {
    let file = parse_example_file(path)?;
    let category: Category = file
        .category
        .parse()
        .map_err(|e: EvalError| EvalError::Validation(format!("{}: {}", path.display(), e)))?;

    let mut examples = Vec::with_capacity(file.examples.len());
    for (index, value) in file.examples.into_iter().enumerate() {
        let at = || format!("{}: examples[{}]", path.display(), index);

        let record: ExampleRecord = serde_yaml::from_value(value)
            .map_err(|e| EvalError::Validation(format!("{}: {}", at(), e)))?;

        if let Some(declared) = &record.category {
            let declared: Category = declared
                .parse()
                .map_err(|e: EvalError| EvalError::Validation(format!("{}: {}", at(), e)))?;
            if declared != category {
                return Err(EvalError::Validation(format!(
                    "{}: record category '{}' does not match file category '{}'",
                    at(),
                    declared,
                    category
                )));
            }
        }

        let example = ExpertExample {
            id: record.id,
            category,
            query_text: record.query,
            expert_response: record.expert_response,
            expert_reasoning: record.expert_reasoning,
            key_points: record.key_points,
            quality_score: record.quality_score,
            source: record.source,
        };
        example
            .validate()
            .map_err(|e| EvalError::Validation(format!("{}: {}", at(), e)))?;
        examples.push(example);
    }

    debug!(
        file = %path.display(),
        category = %category,
        count = examples.len(),
        "Loaded example file"
    );
    Ok(examples)
}

/// Load every category file in `dir` into a new bank
pub fn load_example_dir(dir: &Path, policy: DedupPolicy) -> EvalResult<ExampleBank> {
    let mut seen = HashSet::new();
    let mut all = Vec::new();
    for path in example_files(dir)? {
        for example in load_example_file(&path)? {
            if !seen.insert(example.id.clone()) {
                return Err(EvalError::Validation(format!(
                    "{}: duplicate example id '{}'",
                    path.display(),
                    example.id
                )));
            }
            all.push(example);
        }
    }

    let bank = ExampleBank::from_examples(all, policy)?;
    info!(dir = %dir.display(), examples = bank.len(), "Loaded example bank");
    Ok(bank)
}

/// Write the bank back out, one file per non-empty category
///
/// A file being replaced keeps its `description`.
pub fn write_example_dir(dir: &Path, bank: &ExampleBank) -> EvalResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (category, examples) in bank.snapshot() {
        if examples.is_empty() {
            continue;
        }
        let records = examples
            .into_iter()
            .map(|e| {
                serde_yaml::to_value(ExampleRecord {
                    id: e.id,
                    category: None,
                    query: e.query_text,
                    expert_response: e.expert_response,
                    expert_reasoning: e.expert_reasoning,
                    key_points: e.key_points,
                    quality_score: e.quality_score,
                    source: e.source,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EvalError::Validation(format!("Failed to encode examples: {}", e)))?;

        let path = dir.join(format!("{}.yaml", category.as_str()));
        let description = if path.is_file() {
            parse_example_file(&path)?.description
        } else {
            None
        };

        let file = ExampleFile {
            category: category.as_str().to_string(),
            description,
            examples: records,
        };
        let yaml = serde_yaml::to_string(&file)
            .map_err(|e| EvalError::Validation(format!("Failed to encode examples: {}", e)))?;

        std::fs::write(&path, yaml)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALING: &str = r#"
category: scaling
description: Capacity planning
examples:
  - id: sc_001
    query: "How do I autoscale search pods?"
    expert_response: "Configure an HPA on CPU and query latency."
    expert_reasoning: "Autoscaling needs metrics"
    key_points:
      - HorizontalPodAutoscaler
      - metrics-server
    quality_score: 0.95
  - id: sc_002
    category: scaling
    query: "When should I add shards?"
    expert_response: "Keep shards between 10 and 50 GB."
    key_points: ["shard sizing"]
"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "scaling.yaml", SCALING);

        let examples = load_example_file(&path).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].category, Category::Scaling);
        assert_eq!(examples[0].key_points.len(), 2);
        assert_eq!(examples[1].quality_score, None);
    }

    #[test]
    fn test_missing_field_fails_with_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "perf.yaml",
            r#"
category: performance
examples:
  - id: p1
    query: "Slow search"
    expert_response: "Check heap"
    key_points: ["heap"]
  - id: p2
    query: "Slow indexing"
    key_points: ["refresh interval"]
"#,
        );

        let err = load_example_file(&path).unwrap_err();
        assert!(matches!(err, EvalError::Validation(_)));
        let msg = err.to_string();
        assert!(msg.contains("examples[1]"), "{}", msg);
        assert!(msg.contains("expert_response"), "{}", msg);
    }

    #[test]
    fn test_unknown_category_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "net.yaml", "category: networking\nexamples: []\n");
        assert!(matches!(load_example_file(&path), Err(EvalError::Validation(_))));
    }

    #[test]
    fn test_category_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "scaling.yaml",
            r#"
category: scaling
examples:
  - id: x
    category: performance
    query: q
    expert_response: r
    key_points: [k]
"#,
        );
        let err = load_example_file(&path).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_empty_key_points_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "scaling.yaml",
            "category: scaling\nexamples:\n  - id: x\n    query: q\n    expert_response: r\n    key_points: []\n",
        );
        assert!(matches!(load_example_file(&path), Err(EvalError::Validation(_))));
    }

    #[test]
    fn test_missing_dir_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_example_dir(&dir.path().join("nope"), DedupPolicy::Normalized).unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }

    #[test]
    fn test_load_dir_and_write_back() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scaling.yaml", SCALING);
        write(dir.path(), "notes.txt", "ignored");

        let bank = load_example_dir(dir.path(), DedupPolicy::Normalized).unwrap();
        assert_eq!(bank.len(), 2);

        let out = tempfile::tempdir().unwrap();
        let written = write_example_dir(out.path(), &bank).unwrap();
        assert_eq!(written.len(), 1);

        let reloaded = load_example_dir(out.path(), DedupPolicy::Normalized).unwrap();
        assert_eq!(reloaded.snapshot(), bank.snapshot());
    }

    #[test]
    fn test_write_back_keeps_description() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scaling.yaml", SCALING);

        let bank = load_example_dir(dir.path(), DedupPolicy::Normalized).unwrap();
        bank.add(ExpertExample {
            id: "promoted-scaling-tc_004-0000abcd".into(),
            category: Category::Scaling,
            query_text: "Autoscaling at peak hours".into(),
            expert_response: "Use an HPA".into(),
            expert_reasoning: None,
            key_points: vec!["HPA".into()],
            quality_score: Some(0.9),
            source: ExampleSource::Promoted,
        })
        .unwrap();
        write_example_dir(dir.path(), &bank).unwrap();

        let path = dir.path().join("scaling.yaml");
        let file = parse_example_file(&path).unwrap();
        assert_eq!(file.description.as_deref(), Some("Capacity planning"));
        assert_eq!(load_example_file(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_ids_across_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", SCALING);
        write(dir.path(), "b.yaml", SCALING);
        let err = load_example_dir(dir.path(), DedupPolicy::Normalized).unwrap_err();
        assert!(err.to_string().contains("duplicate example id"));
    }
}
