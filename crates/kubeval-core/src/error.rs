//! Error types for the evaluation engine

use kubeval_llm::LLMError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for evaluation operations
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Unified error type for the evaluation engine
#[derive(Error, Debug)]
pub enum EvalError {
    /// Malformed input data (example record, dataset entry, invalid category)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Completion call failed (timeout, connection, rate limit, server error)
    #[error("Model invocation failed after {attempts} attempt(s): {message}")]
    ModelInvocation {
        attempts: u32,
        message: String,
        retriable: bool,
    },

    /// Model output could not be parsed into the score schema
    #[error("Score parse error: {0}")]
    ScoreParse(String),

    /// Missing or invalid run configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serializable error marker stored on failed evaluation items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ModelInvocation,
    ScoreParse,
    Configuration,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ModelInvocation => "model_invocation",
            ErrorKind::ScoreParse => "score_parse",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

impl EvalError {
    /// Returns true if retrying the same call may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, EvalError::ModelInvocation { retriable: true, .. })
    }

    /// Marker used in reports and failure statistics
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Validation(_) => ErrorKind::Validation,
            EvalError::ModelInvocation { .. } => ErrorKind::ModelInvocation,
            EvalError::ScoreParse(_) => ErrorKind::ScoreParse,
            EvalError::Configuration(_) => ErrorKind::Configuration,
            EvalError::Io(_) | EvalError::Serialization(_) => ErrorKind::Io,
        }
    }

    /// Record how many attempts were spent before giving up
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            EvalError::ModelInvocation {
                message, retriable, ..
            } => EvalError::ModelInvocation {
                attempts,
                message,
                retriable,
            },
            other => other,
        }
    }
}

impl From<LLMError> for EvalError {
    fn from(err: LLMError) -> Self {
        EvalError::ModelInvocation {
            attempts: 1,
            retriable: err.is_retriable(),
            message: err.to_string(),
        }
    }
}
