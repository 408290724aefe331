//! Closed set of query categories

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functional category of a user query
///
/// Declaration order is significant: it is the classifier's tie-break order
/// and the ordering of per-category report entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ErrorAnalysis,
    Performance,
    Configuration,
    Scaling,
    Troubleshooting,
    General,
}

impl Category {
    /// All categories in declaration order
    pub const ALL: [Category; 6] = [
        Category::ErrorAnalysis,
        Category::Performance,
        Category::Configuration,
        Category::Scaling,
        Category::Troubleshooting,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ErrorAnalysis => "error_analysis",
            Category::Performance => "performance",
            Category::Configuration => "configuration",
            Category::Scaling => "scaling",
            Category::Troubleshooting => "troubleshooting",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .or_else(|| (normalized == "other").then_some(Category::General))
            .ok_or_else(|| {
                EvalError::Validation(format!(
                    "Unknown category '{}'. Expected one of: {}",
                    s,
                    Category::ALL
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}
