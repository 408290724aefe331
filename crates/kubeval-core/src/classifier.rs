//! Keyword-indicator query classifier

use crate::category::Category;
use tracing::trace;

/// Maps query text to a [`Category`] by counting indicator matches
///
/// Matching is case-insensitive substring search. Each indicator counts at
/// most once. The category with the most distinct matches wins, ties go to
/// the category declared first, and a query matching nothing is `General`.
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    indicators: Vec<(Category, Vec<String>)>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClassifier {
    /// Classifier with the built-in Kubernetes / search-cluster indicator sets
    pub fn new() -> Self {
        Self::with_indicators(default_indicators().into_iter().map(|(category, words)| {
            (category, words.iter().map(|w| w.to_string()).collect())
        }))
    }

    /// Classifier over a caller-supplied indicator table
    ///
    /// Result does not depend on the iteration order of `sets`.
    pub fn with_indicators<I>(sets: I) -> Self
    where
        I: IntoIterator<Item = (Category, Vec<String>)>,
    {
        let mut indicators: Vec<(Category, Vec<String>)> = Vec::new();
        for (category, words) in sets {
            let words = words
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty());
            match indicators.iter_mut().find(|(c, _)| *c == category) {
                Some((_, existing)) => existing.extend(words),
                None => indicators.push((category, words.collect())),
            }
        }
        for (_, words) in indicators.iter_mut() {
            words.sort();
            words.dedup();
        }
        indicators.sort_by_key(|(category, _)| *category);
        Self { indicators }
    }

    /// Assign a category to `query_text`
    pub fn classify(&self, query_text: &str) -> Category {
        let mut best = Category::General;
        let mut best_count = 0usize;

        for (category, count) in self.match_counts(query_text) {
            // strict comparison keeps the earlier-declared category on ties
            if count > best_count {
                best = category;
                best_count = count;
            }
        }

        trace!(category = %best, matches = best_count, "Classified query");
        best
    }

    /// Number of distinct indicators each registered category matched
    pub fn match_counts(&self, query_text: &str) -> Vec<(Category, usize)> {
        let lowered = query_text.to_lowercase();
        self.indicators
            .iter()
            .map(|(category, words)| {
                let count = words.iter().filter(|w| lowered.contains(w.as_str())).count();
                (*category, count)
            })
            .collect()
    }

    /// Indicator table in category order
    pub fn indicators(&self) -> &[(Category, Vec<String>)] {
        &self.indicators
    }
}

fn default_indicators() -> Vec<(Category, &'static [&'static str])> {
    vec![
        (
            Category::ErrorAnalysis,
            &[
                "error",
                "crashloopbackoff",
                "oomkilled",
                "crash",
                "exception",
                "failed",
                "failure",
                "exit code",
                "stack trace",
                "imagepullbackoff",
                "errimagepull",
                "evicted",
            ],
        ),
        (
            Category::Performance,
            &[
                "performance",
                "latency",
                "slow",
                "response time",
                "throughput",
                "optimize",
                "optimization",
                "bottleneck",
                "cpu usage",
                "memory usage",
                "jvm heap",
                "query time",
            ],
        ),
        (
            Category::Configuration,
            &[
                "configure",
                "configuration",
                "config",
                "yaml",
                "configmap",
                "secret",
                "rolling update",
                "deployment spec",
                "helm",
                "environment variable",
                "probe",
            ],
        ),
        (
            Category::Scaling,
            &[
                "scale",
                "scaling",
                "autoscal",
                "hpa",
                "replica",
                "node pool",
                "capacity",
                "peak",
                "shard",
                "horizontal",
                "vertical",
            ],
        ),
        (
            Category::Troubleshooting,
            &[
                "troubleshoot",
                "debug",
                "diagnose",
                "pending",
                "not working",
                "stuck",
                "unreachable",
                "connectivity",
                "investigate",
                "cannot connect",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reference_queries() {
        let classifier = QueryClassifier::new();

        assert_eq!(
            classifier.classify("My pod is in CrashLoopBackOff state. The logs show 'OOMKilled'. How do I fix this?"),
            Category::ErrorAnalysis
        );
        assert_eq!(
            classifier.classify("How can I optimize my K8s cluster for better search performance? Current response time is 500ms."),
            Category::Performance
        );
        assert_eq!(
            classifier.classify("How do I configure a deployment with rolling updates and zero downtime?"),
            Category::Configuration
        );
        assert_eq!(
            classifier.classify("My cluster is running out of resources during peak hours. How should I implement autoscaling?"),
            Category::Scaling
        );
        assert_eq!(
            classifier.classify("Pods are stuck in Pending, how do I debug this?"),
            Category::Troubleshooting
        );
    }

    #[test]
    fn test_no_match_is_general() {
        let classifier = QueryClassifier::new();
        assert_eq!(classifier.classify("What is Kubernetes?"), Category::General);
        assert_eq!(classifier.classify(""), Category::General);
    }

    #[test]
    fn test_case_insensitive() {
        let classifier = QueryClassifier::new();
        assert_eq!(classifier.classify("HIGH LATENCY"), Category::Performance);
    }

    #[test]
    fn test_tie_goes_to_declared_order_regardless_of_registration() {
        let forward = QueryClassifier::with_indicators(vec![
            (Category::Performance, vec!["alpha".to_string()]),
            (Category::Scaling, vec!["beta".to_string()]),
        ]);
        let reversed = QueryClassifier::with_indicators(vec![
            (Category::Scaling, vec!["beta".to_string()]),
            (Category::Performance, vec!["alpha".to_string()]),
        ]);

        let text = "alpha and beta";
        assert_eq!(forward.classify(text), Category::Performance);
        assert_eq!(reversed.classify(text), Category::Performance);
    }

    #[test]
    fn test_highest_count_wins() {
        let classifier = QueryClassifier::new();
        // one error indicator, three scaling indicators
        let category = classifier.classify("error while trying to scale replicas at peak");
        assert_eq!(category, Category::Scaling);
    }

    #[test]
    fn test_indicator_sets_do_not_overlap_across_categories() {
        let classifier = QueryClassifier::new();
        let table = classifier.indicators();

        for (i, (cat_a, words_a)) in table.iter().enumerate() {
            for (cat_b, words_b) in table.iter().skip(i + 1) {
                for a in words_a {
                    for b in words_b {
                        assert!(
                            !a.contains(b.as_str()) && !b.contains(a.as_str()),
                            "indicator '{}' ({}) overlaps '{}' ({})",
                            a,
                            cat_a,
                            b,
                            cat_b
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let classifier = QueryClassifier::new();
        let text = "debug slow helm rollout";
        let first = classifier.classify(text);
        for _ in 0..10 {
            assert_eq!(classifier.classify(text), first);
        }
    }
}
