use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::llm::{GenerationRequest, TextGenerator};

/// Settings for an OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Keys tried in order; a rate-limited key rotates to the next one.
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Text generator backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiTextGenerator {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiTextGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self, CoreError> {
        if config.api_keys.is_empty() {
            return Err(CoreError::llm_transport(
                "no API key configured for text generation",
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                CoreError::llm_transport(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        let mut last_error: Option<CoreError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let body = ChatCompletionRequest {
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                response_format: ResponseFormat {
                    r#type: "json_object".to_string(),
                },
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: request.system_prompt.clone(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: request.user_prompt.clone(),
                    },
                ],
            };

            let response = self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    last_error = Some(CoreError::llm_transport(format!(
                        "chat completion request failed: {err}"
                    )));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 && index + 1 < self.config.api_keys.len() {
                    let friendly = rate_limit_message(&text);
                    warn!(
                        target: "openai",
                        message = %friendly,
                        attempt = index + 1,
                        remaining = self.config.api_keys.len() - index - 1,
                        "rate limited; switching API key"
                    );
                    last_error = Some(CoreError::llm_transport(friendly));
                    continue;
                }
                return Err(CoreError::llm_transport(format!(
                    "chat completion returned {status}: {text}"
                )));
            }

            let response: ChatCompletionResponse = response.json().await.map_err(|err| {
                CoreError::llm_transport(format!("chat completion response invalid: {err}"))
            })?;

            if let Some(usage) = &response.usage {
                debug!(
                    target: "openai",
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "chat completion usage"
                );
            }

            return response
                .choices
                .first()
                .and_then(|choice| choice.message.content.as_text())
                .ok_or_else(|| {
                    CoreError::plan_generation("chat completion response missing content")
                });
        }

        Err(last_error
            .unwrap_or_else(|| CoreError::llm_transport("chat completion exhausted all API keys")))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

/// Some gateways return content as a string, others as typed parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: Option<String>,
}

fn rate_limit_message(raw: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(raw) {
        if let Some(message) = envelope.error.message {
            return format!("rate limit exceeded: {}", message.trim());
        }
    }
    "rate limit exceeded".to_string()
}
