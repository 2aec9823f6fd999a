//! Generation error types

use thiserror::Error;

use crate::llm::LlmError;

/// Terminal outcome of a submission that produced no petition
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A submission is already in flight; nothing was sent
    #[error("A petition is already being generated")]
    Busy,

    #[error("Failed to build prompt: {0}")]
    Prompt(String),

    /// Every attempt was rate limited
    #[error("Rate limit persisted after {attempts} attempts")]
    RateLimitExhausted {
        attempts: u32,
        #[source]
        last: LlmError,
    },

    /// Non-429 status, network failure or unreadable body
    #[error(transparent)]
    Transport(LlmError),

    #[error("Generation produced no usable output")]
    EmptyResult,

    /// Export or review requested before a successful generation
    #[error("No generated petition is available")]
    NotGenerated,

    #[error("Failed to export petition: {0}")]
    Export(#[from] std::io::Error),
}

impl GenerationError {
    /// True for failures of the call itself, as opposed to rate-limit exhaustion
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyResult => Self::EmptyResult,
            other => Self::Transport(other),
        }
    }
}
