//! Incremental aggregation of evaluation results into a report

use crate::category::Category;
use crate::error::ErrorKind;
use crate::report::{
    CategoryStats, ConfidenceCorrelation, Dimension, EvaluationReport, ImprovementAreas,
    OverallStats, RunMetadata, ScoreDistribution, ScoreStats, IMPROVEMENT_THRESHOLD,
};
use crate::types::{round6, EvaluationResult};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

/// Running sums over scored items
#[derive(Debug, Clone, Default)]
struct RunningScores {
    count: usize,
    accuracy: f64,
    relevance: f64,
    completeness: f64,
    overall: f64,
    overall_sq: f64,
    min_overall: f64,
    max_overall: f64,
}

impl RunningScores {
    fn add(&mut self, result: &EvaluationResult) {
        let s = &result.score;
        if self.count == 0 {
            self.min_overall = s.overall;
            self.max_overall = s.overall;
        } else {
            self.min_overall = self.min_overall.min(s.overall);
            self.max_overall = self.max_overall.max(s.overall);
        }
        self.count += 1;
        self.accuracy += s.accuracy;
        self.relevance += s.relevance;
        self.completeness += s.completeness;
        self.overall += s.overall;
        self.overall_sq += s.overall * s.overall;
    }

    fn finalize(&self) -> Option<ScoreStats> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.overall / n;
        // population variance; clamp tiny negative rounding residue
        let variance = (self.overall_sq / n - mean * mean).max(0.0);
        Some(ScoreStats {
            count: self.count,
            mean_accuracy: round6(self.accuracy / n),
            mean_relevance: round6(self.relevance / n),
            mean_completeness: round6(self.completeness / n),
            mean_overall: round6(mean),
            min_overall: self.min_overall,
            max_overall: self.max_overall,
            std_overall: round6(variance.sqrt()),
        })
    }
}

/// Pearson correlation over population moments; `None` if either series is constant
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

fn confidence_correlation(pairs: &[(f64, f64)]) -> ConfidenceCorrelation {
    if pairs.len() < 2 {
        return ConfidenceCorrelation {
            sample_size: pairs.len(),
            correlation: None,
            avg_confidence: None,
            avg_score: None,
            confidence_accuracy_gap: None,
        };
    }
    let n = pairs.len() as f64;
    let avg_confidence = pairs.iter().map(|(c, _)| c).sum::<f64>() / n;
    let avg_score = pairs.iter().map(|(_, s)| s).sum::<f64>() / n;
    ConfidenceCorrelation {
        sample_size: pairs.len(),
        correlation: pearson(pairs).map(round6),
        avg_confidence: Some(round6(avg_confidence)),
        avg_score: Some(round6(avg_score)),
        confidence_accuracy_gap: Some(round6((avg_confidence - avg_score).abs())),
    }
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    scores: RunningScores,
    failed: usize,
    passed: usize,
}

impl Bucket {
    fn add(&mut self, result: &EvaluationResult) {
        if result.is_failed() {
            self.failed += 1;
            return;
        }
        self.scores.add(result);
        if result.passed_threshold {
            self.passed += 1;
        }
    }

    fn total(&self) -> usize {
        self.scores.count + self.failed
    }
}

/// Consumes results in order and produces an [`EvaluationReport`]
///
/// Not thread-safe by itself; the batch driver feeds it from a single task.
#[derive(Debug, Default)]
pub struct Aggregator {
    overall: Bucket,
    per_category: BTreeMap<Category, Bucket>,
    failures_by_kind: BTreeMap<ErrorKind, usize>,
    distribution: ScoreDistribution,
    low_performing: usize,
    weak_dimensions: BTreeMap<Dimension, usize>,
    missing_points: HashMap<String, usize>,
    /// (agent confidence, overall) for scored items that reported a confidence
    confidence_pairs: Vec<(f64, f64)>,
    promoted: usize,
    items: Vec<EvaluationResult>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one result; failed items count toward failure statistics only
    pub fn add(&mut self, result: EvaluationResult) {
        self.overall.add(&result);
        self.per_category
            .entry(result.category)
            .or_default()
            .add(&result);

        match &result.error {
            Some(failure) => {
                *self.failures_by_kind.entry(failure.kind).or_default() += 1;
            }
            None => {
                let score = &result.score;
                self.distribution.record(score.overall);
                if score.overall < IMPROVEMENT_THRESHOLD {
                    self.low_performing += 1;
                    for (dimension, value) in [
                        (Dimension::Accuracy, score.accuracy),
                        (Dimension::Relevance, score.relevance),
                        (Dimension::Completeness, score.completeness),
                    ] {
                        if value < IMPROVEMENT_THRESHOLD {
                            *self.weak_dimensions.entry(dimension).or_default() += 1;
                        }
                    }
                }
                for point in &score.missing_points {
                    *self.missing_points.entry(point.clone()).or_default() += 1;
                }
                if let Some(confidence) = result.response.confidence() {
                    self.confidence_pairs.push((confidence, score.overall));
                }
            }
        }

        self.items.push(result);
    }

    /// Count a promotion made from an added result
    pub fn record_promotion(&mut self) {
        self.promoted += 1;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build the report; `metadata.finished_at` is stamped here
    pub fn finalize(self, mut metadata: RunMetadata) -> EvaluationReport {
        metadata.finished_at = Utc::now();

        let total = self.overall.total();
        let scored = self.overall.scores.count;
        let failure_rate = if total == 0 {
            0.0
        } else {
            round6(self.overall.failed as f64 / total as f64)
        };

        let per_category = self
            .per_category
            .iter()
            .map(|(category, bucket)| {
                (
                    *category,
                    CategoryStats {
                        total: bucket.total(),
                        scored: bucket.scores.count,
                        failed: bucket.failed,
                        passed_threshold: bucket.passed,
                        scores: bucket.scores.finalize(),
                    },
                )
            })
            .collect();

        let weak_dimension_share: BTreeMap<Dimension, f64> = if scored == 0 {
            BTreeMap::new()
        } else {
            self.weak_dimensions
                .iter()
                .map(|(d, count)| (*d, round6(*count as f64 / scored as f64)))
                .collect()
        };
        // ties resolve to the first dimension in declaration order
        let most_common_issue = self
            .weak_dimensions
            .iter()
            .fold(None::<(Dimension, usize)>, |best, (d, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((*d, *count)),
            })
            .map(|(d, _)| d);

        let mut frequent_missing_points: Vec<(String, usize)> =
            self.missing_points.into_iter().collect();
        frequent_missing_points.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        frequent_missing_points.truncate(10);

        EvaluationReport {
            metadata,
            overall: OverallStats {
                total,
                scored,
                failed: self.overall.failed,
                failure_rate,
                passed_threshold: self.overall.passed,
                promoted: self.promoted,
                failures_by_kind: self.failures_by_kind,
                scores: self.overall.scores.finalize(),
            },
            per_category,
            distribution: self.distribution,
            improvement_areas: ImprovementAreas {
                threshold: IMPROVEMENT_THRESHOLD,
                low_performing: self.low_performing,
                low_performing_share: if scored == 0 {
                    0.0
                } else {
                    round6(self.low_performing as f64 / scored as f64)
                },
                weak_dimension_share,
                most_common_issue,
                frequent_missing_points,
            },
            confidence_correlation: confidence_correlation(&self.confidence_pairs),
            items: self.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorType;
    use crate::types::{AgentResponse, ItemFailure, Query, ScorePayload, StrategyKind};

    fn result(category: Category, a: f64, r: f64, c: f64, overall: f64) -> EvaluationResult {
        let mut score = ScorePayload::zeroed("test");
        score.accuracy = a;
        score.relevance = r;
        score.completeness = c;
        score.overall = overall;
        EvaluationResult {
            query: Query::new("q", "text").with_category(category),
            response: AgentResponse::new("q", "answer"),
            reference: None,
            category,
            strategy_used: StrategyKind::PureModel,
            score,
            passed_threshold: overall >= 0.8,
            attempts: 1,
            examples_used: 0,
            error: None,
            evaluated_at: Utc::now(),
        }
    }

    fn failed(category: Category, kind: ErrorKind) -> EvaluationResult {
        let mut r = result(category, 0.0, 0.0, 0.0, 0.0);
        r.error = Some(ItemFailure {
            kind,
            message: "boom".into(),
        });
        r
    }

    fn metadata() -> RunMetadata {
        RunMetadata::start(EvaluatorType::Llm, 0.8, 0)
    }

    #[test]
    fn test_category_mean() {
        let mut agg = Aggregator::new();
        agg.add(result(Category::Scaling, 0.9, 0.9, 0.9, 0.9));
        agg.add(result(Category::Scaling, 0.7, 0.7, 0.7, 0.7));

        let report = agg.finalize(metadata());
        let scaling = report.per_category[&Category::Scaling].scores.clone().unwrap();
        assert!((scaling.mean_overall - 0.8).abs() < 1e-9);
        assert!((scaling.std_overall - 0.1).abs() < 1e-9);
        assert_eq!(scaling.min_overall, 0.7);
        assert_eq!(scaling.max_overall, 0.9);

        let overall = report.overall.scores.unwrap();
        assert!((overall.mean_overall - 0.8).abs() < 1e-9);
        assert_eq!(overall.count, 2);
    }

    #[test]
    fn test_empty_categories_have_no_entry() {
        let mut agg = Aggregator::new();
        agg.add(result(Category::Performance, 0.5, 0.5, 0.5, 0.5));
        let report = agg.finalize(metadata());

        assert_eq!(report.per_category.len(), 1);
        assert!(!report.per_category.contains_key(&Category::General));
    }

    #[test]
    fn test_failures_are_counted_separately() {
        let mut agg = Aggregator::new();
        agg.add(result(Category::Scaling, 1.0, 1.0, 1.0, 1.0));
        agg.add(failed(Category::Scaling, ErrorKind::ScoreParse));
        agg.add(failed(Category::Configuration, ErrorKind::ModelInvocation));

        let report = agg.finalize(metadata());
        assert_eq!(report.overall.total, 3);
        assert_eq!(report.overall.scored, 1);
        assert_eq!(report.overall.failed, 2);
        assert!((report.overall.failure_rate - 0.666667).abs() < 1e-9);
        assert_eq!(report.overall.failures_by_kind[&ErrorKind::ScoreParse], 1);

        // failed items do not pull the mean down
        let scaling = &report.per_category[&Category::Scaling];
        assert_eq!(scaling.failed, 1);
        assert_eq!(scaling.scores.as_ref().unwrap().mean_overall, 1.0);

        let config = &report.per_category[&Category::Configuration];
        assert_eq!(config.total, 1);
        assert!(config.scores.is_none());
        assert_eq!(report.distribution.total(), 1);
    }

    #[test]
    fn test_improvement_areas() {
        let mut agg = Aggregator::new();
        let mut weak = result(Category::Performance, 0.9, 0.3, 0.4, 0.57);
        weak.score.missing_points = vec!["JVM heap".into()];
        agg.add(weak);
        agg.add(result(Category::Performance, 0.5, 0.9, 0.6, 0.65));
        agg.add(result(Category::Performance, 0.9, 0.9, 0.9, 0.9));

        let report = agg.finalize(metadata());
        let areas = &report.improvement_areas;
        assert_eq!(areas.low_performing, 2);
        assert!((areas.low_performing_share - 0.666667).abs() < 1e-9);
        // shares are relative to every scored item, not just the low performers
        assert!((areas.weak_dimension_share[&Dimension::Completeness] - 0.666667).abs() < 1e-9);
        assert!((areas.weak_dimension_share[&Dimension::Accuracy] - 0.333333).abs() < 1e-9);
        assert_eq!(areas.most_common_issue, Some(Dimension::Completeness));
        assert_eq!(areas.frequent_missing_points, vec![("JVM heap".to_string(), 1)]);
    }

    #[test]
    fn test_items_keep_insertion_order_and_promotions() {
        let mut agg = Aggregator::new();
        for i in 0..4 {
            let mut r = result(Category::General, 0.5, 0.5, 0.5, 0.5);
            r.query.id = format!("q{}", i);
            agg.add(r);
        }
        agg.record_promotion();

        let report = agg.finalize(metadata());
        let ids: Vec<_> = report.items.iter().map(|r| r.query.id.as_str()).collect();
        assert_eq!(ids, vec!["q0", "q1", "q2", "q3"]);
        assert_eq!(report.overall.promoted, 1);
    }

    fn confident(overall: f64, confidence: f64) -> EvaluationResult {
        let mut r = result(Category::Scaling, overall, overall, overall, overall);
        r.response = r.response.with_confidence(confidence);
        r
    }

    #[test]
    fn test_confidence_correlation() {
        let mut agg = Aggregator::new();
        agg.add(confident(0.2, 0.3));
        agg.add(confident(0.6, 0.5));
        agg.add(confident(1.0, 0.7));
        // no confidence reported: not sampled
        agg.add(result(Category::Scaling, 0.1, 0.1, 0.1, 0.1));
        // failed items are not sampled either
        let mut broken = failed(Category::Scaling, ErrorKind::ScoreParse);
        broken.response = broken.response.with_confidence(0.9);
        agg.add(broken);

        let confidence = agg.finalize(metadata()).confidence_correlation;
        assert_eq!(confidence.sample_size, 3);
        assert!((confidence.correlation.unwrap() - 1.0).abs() < 1e-9);
        assert!((confidence.avg_confidence.unwrap() - 0.5).abs() < 1e-9);
        assert!((confidence.avg_score.unwrap() - 0.6).abs() < 1e-9);
        assert!((confidence.confidence_accuracy_gap.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_correlation_needs_two_samples() {
        let mut agg = Aggregator::new();
        agg.add(confident(0.9, 0.8));
        let confidence = agg.finalize(metadata()).confidence_correlation;
        assert_eq!(confidence.sample_size, 1);
        assert!(confidence.correlation.is_none());
        assert!(confidence.avg_confidence.is_none());

        let mut agg = Aggregator::new();
        agg.add(confident(0.9, 0.8));
        agg.add(confident(0.4, 0.8));
        let confidence = agg.finalize(metadata()).confidence_correlation;
        // constant confidence has no defined correlation
        assert!(confidence.correlation.is_none());
        assert!((confidence.avg_score.unwrap() - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report() {
        let report = Aggregator::new().finalize(metadata());
        assert_eq!(report.overall.total, 0);
        assert_eq!(report.overall.failure_rate, 0.0);
        assert!(report.overall.scores.is_none());
        assert!(report.per_category.is_empty());
        assert_eq!(report.confidence_correlation.sample_size, 0);
    }
}
