use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{LlmError, LlmResult};
use crate::provider::LlmProvider;
use crate::LlmConfig;

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(4);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

/// Client for any endpoint speaking the OpenAI `chat/completions` protocol.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> LlmResult<Self> {
        Self::new(LlmConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn request_once(&self, api_key: &str, body: &ChatRequest<'_>) -> LlmResult<Value> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout.as_secs())
                } else {
                    LlmError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed(format!("Status: {}", response.status())));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parse_completion(&data)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleClient {
    async fn chat_json(&self, system: &str, user: &str, schema_hint: &Value) -> LlmResult<Value> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Unavailable("OPENAI_API_KEY not set".to_string()))?;

        let hint = format!(
            "Return ONLY valid JSON. Output must match this schema hint:\n{}",
            serde_json::to_string(schema_hint)?
        );
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
                ChatMessage { role: "user", content: &hint },
            ],
        };

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.request_once(api_key, &body).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!("LLM attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed(format!("no response after {} attempts", attempts))
        }))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Delay after the `attempt`-th failure: 0.5s, 1s, 2s, then capped at 4s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    BACKOFF_BASE.saturating_mul(factor).min(BACKOFF_CAP)
}

/// Pull `choices[0].message.content` out of a completion body and parse it
/// as a JSON object.
pub fn parse_completion(data: &Value) -> LlmResult<Value> {
    let content = data
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()))?;

    let parsed: Value = serde_json::from_str(content.trim())?;
    if !parsed.is_object() {
        return Err(LlmError::InvalidResponse("content is not a JSON object".to_string()));
    }
    Ok(parsed)
}
