//! Gemini generateContent client
//!
//! Implements GenerativeClient over the REST endpoint
//! `{base_url}/v1beta/models/{model}:generateContent`. The API key travels in
//! the `x-goog-api-key` header, never in the URL.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::error::API_KEY_HEADER;
use super::{GenerateContentRequest, GenerateContentResponse, GenerativeClient, LlmError};
use crate::config::LlmConfig;

/// Gemini API client
pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(&config.model, api_key, &config.base_url, config.timeout())
    }

    pub fn new(model: &str, api_key: String, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            model: model.to_string(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(%self.model, prompt_len = prompt.len(), "generate: called");
        let body = GenerateContentRequest::user_prompt(prompt);

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("generate: rate limited (429)");
            return Err(LlmError::RateLimited);
        }

        if !response.status().is_success() {
            debug!(%status, "generate: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let text = response.text().await?;
        let api_response: GenerateContentResponse = serde_json::from_str(&text)?;
        if let Some(usage) = &api_response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "generate: usage"
            );
        }

        match api_response.first_text() {
            Some(text) => {
                debug!(text_len = text.len(), "generate: success");
                Ok(text.to_string())
            }
            None => {
                debug!("generate: no candidates");
                Err(LlmError::EmptyResult)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response and return the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn client(base_url: &str) -> GeminiClient {
        GeminiClient::new("gemini-test", "k-123".to_string(), base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_success_posts_expected_request() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"PETIÇÃO"}]}}]}"#,
        )
        .await;

        let text = client(&url).generate("olá").await.unwrap();
        assert_eq!(text, "PETIÇÃO");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-test:generateContent HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: k-123"));
        assert!(request.contains(r#"{"contents":[{"role":"user","parts":[{"text":"olá"}]}]}"#));
    }

    #[tokio::test]
    async fn test_generate_maps_429_to_rate_limited() {
        let (url, _server) = serve_once("429 Too Many Requests", "{}").await;
        let err = client(&url).generate("p").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn test_generate_maps_other_status_to_api_error() {
        let (url, _server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let err = client(&url).generate("p").await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_generate_without_candidates_is_empty_result() {
        let (url, _server) = serve_once("200 OK", r#"{"candidates":[]}"#).await;
        let err = client(&url).generate("p").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResult));
    }

    #[tokio::test]
    async fn test_network_error_does_not_leak_api_key() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server
        let client = GeminiClient::new("m", "SUPERSECRETKEY".to_string(), "http://127.0.0.1:9", Duration::from_secs(2))
            .unwrap();
        let err = client.generate("p").await.unwrap_err();

        assert!(matches!(err, LlmError::Network(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
        assert!(!format!("{:?}", err).contains("SUPERSECRETKEY"));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = LlmConfig {
            api_key_env: "PETITIONER_TEST_UNSET_GEMINI_KEY".to_string(),
            ..LlmConfig::default()
        };
        let err = GeminiClient::from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey(ref v) if v == "PETITIONER_TEST_UNSET_GEMINI_KEY"));
    }
}
