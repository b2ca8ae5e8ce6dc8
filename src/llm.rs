//! Chat-completion providers behind the [`ChatModel`] trait.
//!
//! - **[`OpenAICompatProvider`]** speaks the `/chat/completions` protocol.
//!   It serves both `groq` (the default, at `https://api.groq.com/openai/v1`)
//!   and `openai`.
//! - **[`OllamaChatProvider`]** calls a local Ollama `/api/chat` endpoint.
//!
//! Every call is a single non-streaming request. `llm.max_retries` defaults
//! to zero, so a failed call surfaces as an [`LlmError`] unless the
//! operator opts into retries; when enabled, 429/5xx and network errors are
//! retried with the same backoff as the embedding providers.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// One prompt for one model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
}

/// A text-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model id requests are sent to.
    fn model_id(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ OpenAI-compatible Provider ============

pub struct OpenAICompatProvider {
    provider: &'static str,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub const GROQ_BASE_URL: &'static str = "https://api.groq.com/openai/v1";
    pub const OPENAI_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Build a provider for `config.provider` (`groq` or `openai`) that
    /// sends requests to `model`.
    ///
    /// # Errors
    ///
    /// [`LlmError::MissingApiKey`] when the key variable (`GROQ_API_KEY`,
    /// `OPENAI_API_KEY`, or `llm.api_key_env`) is unset or empty.
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self, LlmError> {
        let (provider, default_url, default_key_env) = match config.provider.as_str() {
            "openai" => ("openai", Self::OPENAI_BASE_URL, "OPENAI_API_KEY"),
            _ => ("groq", Self::GROQ_BASE_URL, "GROQ_API_KEY"),
        };
        let key_env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| default_key_env.to_string());
        let api_key = std::env::var(&key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey(key_env))?;

        Ok(Self {
            provider,
            model: model.to_string(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if let Some(max) = self.max_output_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAICompatProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.request_body(request);
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_completion(self.provider, &json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = LlmError::Status {
                        provider: self.provider,
                        status: status.as_u16(),
                        body: body_text,
                    };
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(attempt, %status, provider = self.provider, "completion request failed");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, provider = self.provider, "completion request failed");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::Other("completion failed after retries".into())))
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_chat_completion(provider: &'static str, json: &serde_json::Value) -> Result<String, LlmError> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| LlmError::MalformedResponse {
            provider,
            reason: "missing choices".to_string(),
        })?;
    let content = choice
        .pointer("/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| LlmError::MalformedResponse {
            provider,
            reason: "missing message content".to_string(),
        })?;
    non_empty(provider, content)
}

// ============ Ollama Provider ============

pub struct OllamaChatProvider {
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChatProvider {
    pub const DEFAULT_URL: &'static str = "http://localhost:11434";

    pub fn new(config: &LlmConfig, model: &str) -> Result<Self, LlmError> {
        Ok(Self {
            model: model.to_string(),
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChatProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));
        let body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let url = format!("{}/api/chat", self.url);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            match self.client.post(&url).json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_chat(&json);
                    }
                    let err = LlmError::Status {
                        provider: "ollama",
                        status: status.as_u16(),
                        body: response.text().await.unwrap_or_default(),
                    };
                    if status.is_server_error() {
                        tracing::warn!(attempt, %status, "Ollama chat request failed");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Ollama chat request failed");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::Other("completion failed after retries".into())))
    }
}

fn parse_ollama_chat(json: &serde_json::Value) -> Result<String, LlmError> {
    let content = json
        .pointer("/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| LlmError::MalformedResponse {
            provider: "ollama",
            reason: "missing message.content".to_string(),
        })?;
    non_empty("ollama", content)
}

fn non_empty(provider: &'static str, content: &str) -> Result<String, LlmError> {
    let text = content.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse { provider });
    }
    Ok(text.to_string())
}

/// Create the configured chat provider, sending requests to `model`.
///
/// `model` is usually `llm.model` or a preset picked at runtime.
pub fn create_chat_model(config: &LlmConfig, model: &str) -> Result<Box<dyn ChatModel>, LlmError> {
    match config.provider.as_str() {
        "groq" | "openai" => Ok(Box::new(OpenAICompatProvider::new(config, model)?)),
        "ollama" => Ok(Box::new(OllamaChatProvider::new(config, model)?)),
        other => Err(LlmError::Other(format!("Unknown llm provider: {}", other))),
    }
}
