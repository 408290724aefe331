//! Parsing of free-form judge output into sub-scores
//!
//! Accepts a JSON object (bare, fenced or embedded in prose) and falls back to
//! `label: number` lines. Any overall score the model reports is ignored.

use crate::error::{EvalError, EvalResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LABELLED_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(accuracy|correctness|relevance|completeness)(?:[ _]score)?\b\W{0,3}[:=]\s*["']?(-?\d+(?:\.\d+)?)\s*(%|/\s*10\b|/\s*100\b)?"#,
    )
    .expect("score label pattern is valid")
});

static LABELLED_RATIONALE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\W*(?:rationale|reasoning|explanation)\W{0,3}[:=]\s*(.+)$")
        .expect("rationale pattern is valid")
});

const ACCURACY_KEYS: &[&str] = &["accuracy", "correctness", "accuracy_score", "correctness_score"];
const RELEVANCE_KEYS: &[&str] = &["relevance", "relevance_score"];
const COMPLETENESS_KEYS: &[&str] = &["completeness", "completeness_score"];
const RATIONALE_KEYS: &[&str] = &["rationale", "reasoning", "explanation", "feedback"];
const MISSING_KEYS: &[&str] = &["missing_points", "missing", "missing_key_points"];

/// Sub-scores recovered from a judge completion, already clamped into [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScores {
    pub accuracy: f64,
    pub relevance: f64,
    pub completeness: f64,
    pub rationale: String,
    pub missing_points: Vec<String>,
}

/// Parse a judge completion into [`ParsedScores`]
pub fn parse_scores(text: &str) -> EvalResult<ParsedScores> {
    if let Some(object) = extract_json_object(text) {
        if let Some(parsed) = from_json(&object) {
            return Ok(parsed);
        }
    }
    from_labels(text)
}

/// Locate a JSON object in fenced or bare form
fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let mut candidates: Vec<&str> = Vec::new();

    if let Some(rest) = text.split("```json").nth(1) {
        if let Some(body) = rest.split("```").next() {
            candidates.push(body.trim());
        }
    } else if let Some(rest) = text.split("```").nth(1) {
        candidates.push(rest.trim());
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates.into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

fn from_json(object: &serde_json::Map<String, Value>) -> Option<ParsedScores> {
    // scores may be nested under "scores"
    let nested = object.get("scores").and_then(Value::as_object);
    let lookup = |keys: &[&str]| -> Option<f64> {
        keys.iter().find_map(|key| {
            object
                .get(*key)
                .or_else(|| nested.and_then(|n| n.get(*key)))
                .and_then(numeric)
        })
    };

    let accuracy = lookup(ACCURACY_KEYS)?;
    let relevance = lookup(RELEVANCE_KEYS)?;
    let completeness = lookup(COMPLETENESS_KEYS)?;

    let rationale = RATIONALE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string();

    let missing_points = MISSING_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ParsedScores {
        accuracy: clamp(accuracy),
        relevance: clamp(relevance),
        completeness: clamp(completeness),
        rationale,
        missing_points,
    })
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn from_labels(text: &str) -> EvalResult<ParsedScores> {
    let mut accuracy = None;
    let mut relevance = None;
    let mut completeness = None;

    for cap in LABELLED_SCORE.captures_iter(text) {
        let Ok(raw) = cap[2].parse::<f64>() else {
            continue;
        };
        let scale = cap.get(3).map(|m| m.as_str().replace(char::is_whitespace, ""));
        let value = match scale.as_deref() {
            Some("%") | Some("/100") => raw / 100.0,
            Some("/10") => raw / 10.0,
            _ => raw,
        };
        let slot = match cap[1].to_lowercase().as_str() {
            "accuracy" | "correctness" => &mut accuracy,
            "relevance" => &mut relevance,
            _ => &mut completeness,
        };
        slot.get_or_insert(value);
    }

    let mut missing = Vec::new();
    if accuracy.is_none() {
        missing.push("accuracy");
    }
    if relevance.is_none() {
        missing.push("relevance");
    }
    if completeness.is_none() {
        missing.push("completeness");
    }
    if !missing.is_empty() {
        return Err(EvalError::ScoreParse(format!(
            "Judge output is missing required score(s): {}. Output: {}",
            missing.join(", "),
            preview(text)
        )));
    }

    let rationale = LABELLED_RATIONALE
        .captures(text)
        .map(|cap| cap[1].trim().to_string())
        .unwrap_or_default();

    Ok(ParsedScores {
        accuracy: clamp(accuracy.unwrap_or_default()),
        relevance: clamp(relevance.unwrap_or_default()),
        completeness: clamp(completeness.unwrap_or_default()),
        rationale,
        missing_points: Vec::new(),
    })
}

fn clamp(value: f64) -> f64 {
    crate::types::clamp_unit(value)
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
