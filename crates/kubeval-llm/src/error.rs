use thiserror::Error;

/// Completion endpoint errors
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Timeout error")]
    TimeoutError,

    #[error("Empty completion: {0}")]
    EmptyResponse(String),
}

/// Result type for completion operations
pub type LLMResult<T> = Result<T, LLMError>;

impl LLMError {
    /// Check if the error is retriable
    ///
    /// Server-side 5xx failures count as transient; 4xx other than 429 do not.
    pub fn is_retriable(&self) -> bool {
        match self {
            LLMError::RateLimitError(_) | LLMError::HttpError(_) | LLMError::TimeoutError => true,
            LLMError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map an HTTP status and body into the matching error variant
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => LLMError::AuthError(message),
            429 => LLMError::RateLimitError(message),
            400 | 404 | 422 => LLMError::InvalidRequest(message),
            _ => LLMError::ApiError { status, message },
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::TimeoutError
        } else if let Some(status) = err.status() {
            LLMError::from_status(status.as_u16(), err.to_string())
        } else {
            LLMError::HttpError(err.to_string())
        }
    }
}
