//! Scripted in-memory provider for tests

use crate::error::{Error, Result};
use crate::provider::{LlmProvider, ModelCallRequest, ProviderResponse, TokenUsage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Scripted provider that replays queued outcomes in order.
///
/// When the queue is empty it echoes a canned response, so tests that
/// only care about call counts do not need to enqueue anything.
pub struct MockProvider {
    name: String,
    outcomes: Mutex<VecDeque<Result<ProviderResponse>>>,
    calls: AtomicUsize,
    delay_ms: AtomicU64,
}

impl MockProvider {
    /// Create a mock provider with the conventional name "mock"
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock provider with a custom name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
        }
    }

    /// Queue a successful response with the given content
    pub async fn enqueue_response(&self, content: impl Into<String>) {
        let content = content.into();
        let tokens = (content.len() / 4) as u32;
        self.outcomes.lock().await.push_back(Ok(ProviderResponse {
            content,
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: tokens,
                total_tokens: 10 + tokens,
            }),
            model: "mock-model".to_string(),
        }));
    }

    /// Queue an error outcome
    pub async fn enqueue_error(&self, error: Error) {
        self.outcomes.lock().await.push_back(Err(error));
    }

    /// Number of complete() calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent complete() sleep before answering
    pub fn set_delay_ms(&self, millis: u64) {
        self.delay_ms.store(millis, Ordering::SeqCst);
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ModelCallRequest) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        match self.outcomes.lock().await.pop_front() {
            // Queued responses report whichever model the caller asked for,
            // the same as the queue-empty echo path.
            Some(Ok(mut response)) => {
                response.model = request.model.clone();
                Ok(response)
            }
            Some(Err(error)) => Err(error),
            None => Ok(ProviderResponse {
                content: format!("mock reply to: {}", request.prompt),
                usage: Some(TokenUsage {
                    prompt_tokens: (request.prompt.len() / 4) as u32,
                    completion_tokens: 8,
                    total_tokens: (request.prompt.len() / 4) as u32 + 8,
                }),
                model: request.model.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_outcomes_in_order() {
        let provider = MockProvider::new();
        provider.enqueue_response("first").await;
        provider
            .enqueue_error(Error::ProviderUnavailable {
                provider: "mock".to_string(),
                message: "down".to_string(),
            })
            .await;

        let request = ModelCallRequest::new("mock-model", "hi");
        let first = provider.complete(&request).await.unwrap();
        assert_eq!(first.content, "first");
        assert!(provider.complete(&request).await.is_err());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_queued_response_reports_requested_model() {
        let provider = MockProvider::named("mock-b");
        provider.enqueue_response("answer").await;

        let request = ModelCallRequest::new("mock-b", "hi");
        let response = provider.complete(&request).await.unwrap();
        assert_eq!(response.model, "mock-b");
        assert_eq!(response.content, "answer");
    }

    #[tokio::test]
    async fn test_echoes_when_queue_empty() {
        let provider = MockProvider::new();
        let request = ModelCallRequest::new("mock-model", "ping");
        let response = provider.complete(&request).await.unwrap();
        assert!(response.content.contains("ping"));
    }
}
