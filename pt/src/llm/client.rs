//! GenerativeClient trait definition

use async_trait::async_trait;

use super::LlmError;

/// Stateless text generation client
///
/// One call is one HTTP attempt. Retrying is the caller's business (see
/// `generation::RetryPolicy`), so implementations must not loop.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Send `prompt` as a single user turn and return the first candidate text
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tracing::debug;

    /// Scripted outcome of one mock attempt
    #[derive(Debug, Clone)]
    pub enum Reply {
        Text(String),
        Status(u16),
        Empty,
    }

    impl Reply {
        pub fn text(s: &str) -> Self {
            Self::Text(s.to_string())
        }

        fn into_result(self) -> Result<String, LlmError> {
            match self {
                Self::Text(t) => Ok(t),
                Self::Status(429) => Err(LlmError::RateLimited),
                Self::Status(status) => Err(LlmError::ApiError {
                    status,
                    message: String::new(),
                }),
                Self::Empty => Err(LlmError::EmptyResult),
            }
        }
    }

    /// Mock client for unit tests
    pub struct MockGenerativeClient {
        replies: Mutex<VecDeque<Reply>>,
        prompts: Mutex<Vec<String>>,
        call_count: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl MockGenerativeClient {
        pub fn new(replies: Vec<Reply>) -> Self {
            debug!(reply_count = %replies.len(), "MockGenerativeClient::new: called");
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                gate: None,
            }
        }

        /// Hold every call until `gate` is notified
        pub fn gated(replies: Vec<Reply>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(replies)
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeClient for MockGenerativeClient {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockGenerativeClient::generate: called");
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(reply) => reply.into_result(),
                None => Err(LlmError::EmptyResult),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_replays_script() {
            let client = MockGenerativeClient::new(vec![Reply::Status(429), Reply::text("ok")]);

            assert!(matches!(client.generate("p").await, Err(LlmError::RateLimited)));
            assert_eq!(client.generate("p").await.unwrap(), "ok");
            assert!(matches!(client.generate("p").await, Err(LlmError::EmptyResult)));

            assert_eq!(client.call_count(), 3);
            assert_eq!(client.prompts(), vec!["p", "p", "p"]);
        }
    }
}
