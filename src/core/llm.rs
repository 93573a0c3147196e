use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Non-streaming chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Any other provider parameter, sent as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            extra: Map::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default = "default_response_role")]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_response_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Chat completion response. Fields this crate does not model are kept in `extra`
/// and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub created: i64,
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletion {
    /// Content of the first choice, if the provider returned any
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// Per-call transport options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    /// Total tries including the first one; `Some(1)` disables retries
    pub max_attempts: Option<u32>,
}

/// The completion function the history adapter wraps
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn create(
        &self,
        request: &CompletionRequest,
        options: &RequestOptions,
    ) -> Result<ChatCompletion>;
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_delay: Duration,
}

impl OpenAIClient {
    const MAX_ATTEMPTS: u32 = 3;

    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_delay: Duration::from_millis(1000),
        }
    }

    /// Base delay of the exponential backoff between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn create(
        &self,
        request: &CompletionRequest,
        options: &RequestOptions,
    ) -> Result<ChatCompletion> {
        let mut body = serde_json::to_value(request)?;
        body["stream"] = Value::Bool(false);

        let max_attempts = options.max_attempts.unwrap_or(Self::MAX_ATTEMPTS).max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry_delay * 2_u32.pow(attempt - 1);
                tracing::warn!(
                    "[OpenAIClient] Retrying API call (attempt {}/{}) after {}ms delay",
                    attempt + 1,
                    max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut builder = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body);
            if let Some(timeout) = options.timeout {
                builder = builder.timeout(timeout);
            }

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("[OpenAIClient] HTTP request failed: {}", e);
                    last_error = Some(anyhow::anyhow!("HTTP request failed: {}", e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::warn!(
                    "[OpenAIClient] API returned error status {}: {}",
                    status,
                    error_text
                );
                let error = anyhow::anyhow!("API error {}: {}", status, error_text);

                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            // Never resent: the provider already generated this completion
            let completion = response.json::<ChatCompletion>().await.map_err(|e| {
                tracing::warn!("[OpenAIClient] Failed to decode response body: {}", e);
                anyhow::anyhow!("Response decode error: {}", e)
            })?;

            tracing::debug!(
                "[OpenAIClient] Completion {} from model '{}' with {} choices",
                completion.id,
                completion.model,
                completion.choices.len()
            );
            return Ok(completion);
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("All retry attempts failed")))
    }
}
