use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LlmError {
    /// Errors worth another attempt. A missing credential never is.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::Unavailable(_))
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
