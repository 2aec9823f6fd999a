//! LLM error types

use thiserror::Error;

/// Header carrying Google API keys
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Failure of a single generateContent attempt
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429; the only status the retry policy retries
    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP error! status: {status}")]
    ApiError { status: u16, message: String },

    /// Transport failure; the request URL is stripped before it is stored
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    #[error("Generation produced no usable output")]
    EmptyResult,

    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),

    #[error("Unknown LLM provider: '{0}'. Supported: gemini")]
    UnsupportedProvider(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.without_url())
    }
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
