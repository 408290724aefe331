//! Evaluation report types and JSON persistence

use crate::category::Category;
use crate::config::EvaluatorType;
use crate::error::{ErrorKind, EvalResult};
use crate::types::EvaluationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use uuid::Uuid;

/// Items scoring below this overall are reported as improvement areas
pub const IMPROVEMENT_THRESHOLD: f64 = 0.7;

/// Score statistics over scored (non-failed) items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub count: usize,
    pub mean_accuracy: f64,
    pub mean_relevance: f64,
    pub mean_completeness: f64,
    pub mean_overall: f64,
    pub min_overall: f64,
    pub max_overall: f64,
    pub std_overall: f64,
}

/// Per-category aggregate; `scores` is absent when every item failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    pub passed_threshold: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreStats>,
}

/// Run-wide aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    pub failure_rate: f64,
    pub passed_threshold: usize,
    pub promoted: usize,
    #[serde(default)]
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreStats>,
}

/// Count of scored items per overall-score bucket; upper bounds inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    #[serde(rename = "0.0-0.2")]
    pub very_low: usize,
    #[serde(rename = "0.2-0.4")]
    pub low: usize,
    #[serde(rename = "0.4-0.6")]
    pub medium: usize,
    #[serde(rename = "0.6-0.8")]
    pub high: usize,
    #[serde(rename = "0.8-1.0")]
    pub very_high: usize,
}

impl ScoreDistribution {
    pub fn record(&mut self, overall: f64) {
        let bucket = if overall <= 0.2 {
            &mut self.very_low
        } else if overall <= 0.4 {
            &mut self.low
        } else if overall <= 0.6 {
            &mut self.medium
        } else if overall <= 0.8 {
            &mut self.high
        } else {
            &mut self.very_high
        };
        *bucket += 1;
    }

    pub fn total(&self) -> usize {
        self.very_low + self.low + self.medium + self.high + self.very_high
    }
}

/// Score dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Accuracy,
    Relevance,
    Completeness,
}

/// Summary of low-scoring items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementAreas {
    pub threshold: f64,
    pub low_performing: usize,
    pub low_performing_share: f64,
    /// Low-performing items weak (below threshold) in each dimension, as a share of scored items
    pub weak_dimension_share: BTreeMap<Dimension, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_common_issue: Option<Dimension>,
    /// Missing points reported most often, with counts, most frequent first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frequent_missing_points: Vec<(String, usize)>,
}

/// How well the agent's self-reported confidence tracks its overall score
///
/// Built from scored items whose response carries a numeric confidence.
/// Everything but `sample_size` is absent below two samples; `correlation`
/// is also absent when either series is constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCorrelation {
    pub sample_size: usize,
    /// Pearson correlation between confidence and overall score
    pub correlation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_score: Option<f64>,
    /// `|avg_confidence - avg_score|`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_accuracy_gap: Option<f64>,
}

/// Identity and timing of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub evaluator_type: EvaluatorType,
    pub promotion_threshold: f64,
    pub total_requested: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RunMetadata {
    pub fn start(
        evaluator_type: EvaluatorType,
        promotion_threshold: f64,
        total_requested: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            evaluator_type,
            promotion_threshold,
            total_requested,
            cancelled: false,
            started_at: now,
            finished_at: now,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Final output of a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metadata: RunMetadata,
    pub overall: OverallStats,
    pub per_category: BTreeMap<Category, CategoryStats>,
    pub distribution: ScoreDistribution,
    pub improvement_areas: ImprovementAreas,
    pub confidence_correlation: ConfidenceCorrelation,
    /// Results in input order
    pub items: Vec<EvaluationResult>,
}

impl EvaluationReport {
    pub fn is_cancelled(&self) -> bool {
        self.metadata.cancelled
    }

    pub fn scored_items(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.items.iter().filter(|r| r.is_scored())
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.items.iter().filter(|r| r.is_failed())
    }

    /// Human-readable summary for terminals and logs
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {} ({})", self.metadata.run_id, self.metadata.evaluator_type);
        if self.metadata.cancelled {
            let _ = writeln!(
                out,
                "CANCELLED: {} of {} items completed",
                self.items.len(),
                self.metadata.total_requested
            );
        }
        let _ = writeln!(
            out,
            "Items: {} total, {} scored, {} failed ({:.1}% failure rate)",
            self.overall.total,
            self.overall.scored,
            self.overall.failed,
            self.overall.failure_rate * 100.0
        );
        for (kind, count) in &self.overall.failures_by_kind {
            let _ = writeln!(out, "  {}: {}", kind, count);
        }
        let _ = writeln!(
            out,
            "Passed threshold ({:.2}): {}, promoted: {}",
            self.metadata.promotion_threshold, self.overall.passed_threshold, self.overall.promoted
        );

        if let Some(scores) = &self.overall.scores {
            let _ = writeln!(
                out,
                "Overall: mean {:.3} (min {:.3}, max {:.3}, std {:.3}) | accuracy {:.3} relevance {:.3} completeness {:.3}",
                scores.mean_overall,
                scores.min_overall,
                scores.max_overall,
                scores.std_overall,
                scores.mean_accuracy,
                scores.mean_relevance,
                scores.mean_completeness
            );
        }

        let _ = writeln!(out, "By category:");
        for (category, stats) in &self.per_category {
            match &stats.scores {
                Some(scores) => {
                    let _ = writeln!(
                        out,
                        "  {:<16} n={:<3} mean {:.3} failed {}",
                        category.as_str(),
                        stats.total,
                        scores.mean_overall,
                        stats.failed
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  {:<16} n={:<3} all failed",
                        category.as_str(),
                        stats.total
                    );
                }
            }
        }

        let d = &self.distribution;
        let _ = writeln!(
            out,
            "Distribution: 0.0-0.2: {} | 0.2-0.4: {} | 0.4-0.6: {} | 0.6-0.8: {} | 0.8-1.0: {}",
            d.very_low, d.low, d.medium, d.high, d.very_high
        );

        let areas = &self.improvement_areas;
        if areas.low_performing > 0 {
            let issue = areas
                .most_common_issue
                .map(|d| format!("{:?}", d).to_lowercase())
                .unwrap_or_else(|| "none".to_string());
            let _ = writeln!(
                out,
                "Below {:.2}: {} items ({:.1}%), most common weakness: {}",
                areas.threshold,
                areas.low_performing,
                areas.low_performing_share * 100.0,
                issue
            );
        }

        let confidence = &self.confidence_correlation;
        if let (Some(avg_confidence), Some(gap)) =
            (confidence.avg_confidence, confidence.confidence_accuracy_gap)
        {
            let correlation = confidence
                .correlation
                .map(|r| format!("{:.3}", r))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "Confidence: n={} mean {:.3}, correlation {}, gap {:.3}",
                confidence.sample_size, avg_confidence, correlation, gap
            );
        }
        out
    }
}

/// Write a report as pretty JSON, creating parent directories
pub fn write_report_json(path: &Path, report: &EvaluationReport) -> EvalResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a report written by [`write_report_json`]
pub fn read_report_json(path: &Path) -> EvalResult<EvaluationReport> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
