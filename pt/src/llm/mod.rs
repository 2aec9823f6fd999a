//! Generative-text client module
//!
//! Provides single-attempt generateContent requests. Retry lives in
//! `crate::generation`.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod gemini;
mod types;

pub use client::GenerativeClient;
pub(crate) use error::API_KEY_HEADER;
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use types::{Candidate, Content, GenerateContentRequest, GenerateContentResponse, Part, UsageMetadata};

use crate::config::LlmConfig;

/// Create a generative client based on the provider specified in config
///
/// Only "gemini" is supported.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn GenerativeClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::UnsupportedProvider(other.to_string()))
        }
    }
}
