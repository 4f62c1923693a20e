//! Text-generation collaborator boundary.
//!
//! The drafter only ever talks to [`TextGenerator`], so OpenAI-compatible
//! backends and offline mocks are interchangeable.

mod openai;
pub mod utils;

pub use openai::{OpenAiConfig, OpenAiTextGenerator};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::CoreError;

/// One prompt exchange sent to the text-generation collaborator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Abstraction over text-generation backends so multiple vendors can plug
/// into the plan drafter.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce one raw completion for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError>;
}

/// Deterministic generator used for tests and offline development.
///
/// Scripted responses are handed out in order, one per call; an exhausted
/// script fails like a transport error so tests notice extra calls.
#[derive(Debug, Default)]
pub struct MockTextGenerator {
    responses: Mutex<VecDeque<String>>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockTextGenerator {
    /// Generator that replays the given responses in order.
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Generator that fails every call with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            failure: Some(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of generate calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(CoreError::llm_transport(message.clone()));
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| CoreError::llm_transport("mock generator lock poisoned"))?;
        responses
            .pop_front()
            .ok_or_else(|| CoreError::llm_transport("mock generator has no scripted response left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_replay_in_order() {
        let generator = MockTextGenerator::scripted(["first", "second"]);
        let request = GenerationRequest::new("system", "user");

        assert_eq!(generator.generate(&request).await.unwrap(), "first");
        assert_eq!(generator.generate(&request).await.unwrap(), "second");
        let err = generator.generate(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::LlmTransport(_)));
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn failing_generator_reports_transport_error() {
        let generator = MockTextGenerator::failing("connection refused");
        let request = GenerationRequest::new("system", "user");
        let err = generator.generate(&request).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
