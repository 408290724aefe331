//! Canned-response agent used to exercise the evaluator without a live cluster

use clap::ValueEnum;
use kubeval_core::{AgentResponse, Category, QueryClassifier, TestCase};
use serde_json::json;
use std::collections::BTreeMap;

/// How thorough the canned answers are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum QualityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
        }
    }

    fn confidence(&self) -> f64 {
        match self {
            QualityLevel::Low => 0.4,
            QualityLevel::Medium => 0.75,
            QualityLevel::High => 0.93,
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers every query from a fixed template per category and quality level
#[derive(Debug, Clone, Default)]
pub struct MockAgent {
    quality: QualityLevel,
    classifier: QueryClassifier,
}

impl MockAgent {
    pub fn new(quality: QualityLevel) -> Self {
        Self {
            quality,
            classifier: QueryClassifier::new(),
        }
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    pub fn respond(&self, case: &TestCase) -> AgentResponse {
        let category = case
            .category
            .unwrap_or_else(|| self.classifier.classify(&case.query));
        let (text, guessed) = fill(template(category, self.quality), &case.context);
        // less sure when the answer had to fall back to placeholder context
        let confidence = (self.quality.confidence() - 0.1 * guessed as f64).max(0.0);

        AgentResponse::new(case.id.clone(), text)
            .with_confidence(confidence)
            .with_metadata("agent", json!("mock"))
            .with_metadata("quality_level", json!(self.quality.as_str()))
            .with_metadata("sources", json!(sources(category, self.quality)))
    }
}

fn template(category: Category, quality: QualityLevel) -> &'static str {
    use QualityLevel::*;
    match (category, quality) {
        (Category::ErrorAnalysis, High) => {
            "Based on the error '{error}', this appears to be a resource constraint issue. \
             The root cause is likely insufficient memory allocation. \
             To resolve this: 1) Check resource limits with 'kubectl describe pod' \
             2) Increase memory limits in deployment spec 3) Monitor pod metrics after changes. \
             Additionally, investigate memory leaks to prevent recurrence."
        }
        (Category::ErrorAnalysis, Medium) => {
            "The error '{error}' suggests a resource constraint issue. \
             Try these steps: 1) Check resource limits with 'kubectl describe pod' \
             2) Increase memory limits in deployment spec."
        }
        (Category::Performance, High) => {
            "Performance analysis shows {metric} is above threshold. This indicates \
             resource contention on shared nodes. Recommendations: 1) Configure node affinity \
             and dedicated node pools 2) Use SSD-backed storage 3) Tune the JVM heap \
             4) Enable HPA with target CPU 70%. Expected improvement: 25-30%"
        }
        (Category::Performance, Medium) => {
            "The {metric} seems above threshold. Consider enabling HPA with target CPU 70% \
             to improve performance."
        }
        (Category::Configuration, High) => {
            "For the deployment, the recommended configuration is: strategy type RollingUpdate \
             with maxSurge: 1 and maxUnavailable: 0, a readiness probe, and a preStop hook \
             with terminationGracePeriodSeconds for graceful shutdown. Add a \
             PodDisruptionBudget. Important: monitor after applying changes."
        }
        (Category::Configuration, Medium) => {
            "Update the deployment with: strategy type RollingUpdate and maxUnavailable: 0."
        }
        (Category::Scaling, High) => {
            "Set up a Horizontal Pod Autoscaler on CPU and memory, enable the Cluster \
             Autoscaler for node scaling, use a Vertical Pod Autoscaler to right-size requests \
             and add scheduled scaling for peak hours. Keep resource requests and limits accurate."
        }
        (Category::Scaling, Medium) => {
            "Configure a Horizontal Pod Autoscaler and the Cluster Autoscaler."
        }
        (Category::Troubleshooting, High) => {
            "For '{error}': 1) Create a docker-registry secret with the registry credentials \
             2) Add imagePullSecrets to the pod spec 3) Verify the registry URL and image tag \
             4) Check network connectivity to the registry 5) Confirm the service account \
             permissions."
        }
        (Category::Troubleshooting, Medium) => {
            "For '{error}', create a docker-registry secret and reference it in imagePullSecrets."
        }
        (Category::General, High) | (Category::General, Medium) => {
            "Check 'kubectl describe' and 'kubectl get events' for the affected resources, \
             then review the Kubernetes documentation for the component involved."
        }
        (Category::ErrorAnalysis, Low) => "Error '{error}' occurred. Try restarting the pod.",
        (Category::Performance, Low) => "Performance might be slow. Try scaling up.",
        (Category::Configuration, Low) => "Check your configuration files.",
        (Category::Scaling, Low) => "Add more nodes.",
        (Category::Troubleshooting, Low) | (Category::General, Low) => "Try restarting the pod.",
    }
}

/// Substitute `{error}` and `{metric}` from the query context
///
/// Also returns how many placeholders used a fallback value.
fn fill(template: &str, context: &BTreeMap<String, serde_json::Value>) -> (String, usize) {
    let mut text = template.to_string();
    let mut guessed = 0;
    for (key, fallback) in [("error", "Unknown error"), ("metric", "CPU usage")] {
        let placeholder = format!("{{{}}}", key);
        if !text.contains(&placeholder) {
            continue;
        }
        let value = match context.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                guessed += 1;
                fallback.to_string()
            }
        };
        text = text.replace(&placeholder, &value);
    }
    (text, guessed)
}

fn sources(category: Category, quality: QualityLevel) -> Vec<String> {
    let mut sources = vec![
        "Kubernetes Official Documentation".to_string(),
        "Internal Runbook #K8S-001".to_string(),
    ];
    match quality {
        QualityLevel::High => {
            sources.push("Cluster Metrics Dashboard".to_string());
            sources.push(format!("Previous incident analysis for {}", category));
        }
        QualityLevel::Medium => sources.push("Similar resolved issues".to_string()),
        QualityLevel::Low => {}
    }
    sources
}
