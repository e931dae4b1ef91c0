//! OpenAI-compatible chat-completions client used as the production [`Analyzer`].

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use xhsop_core::{AppConfig, NoteRecord};

use crate::analyzer::Analyzer;
use crate::error::AnalyzerError;
use crate::prompt::{build_messages, ChatMessage, PromptLimits};
use crate::retry::{max_total_backoff_ms, retry_with_backoff};

/// Longest error body kept in [`AnalyzerError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Settings for [`ChatAnalyzer`].
#[derive(Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub max_content_chars: usize,
    pub max_images: usize,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("max_content_chars", &self.max_content_chars)
            .field("max_images", &self.max_images)
            .finish()
    }
}

impl ChatConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.llm_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            request_timeout_secs: config.llm_request_timeout_secs,
            max_retries: config.llm_max_retries,
            retry_backoff_base_ms: config.llm_retry_backoff_base_ms,
            max_content_chars: config.max_content_chars,
            max_images: config.max_images_per_note,
        }
    }

    /// Upper bound for one [`Analyzer::analyze`] call: every attempt timing
    /// out plus the longest back-off between attempts.
    #[must_use]
    pub fn call_deadline(&self) -> Duration {
        let attempts = u64::from(self.max_retries) + 1;
        Duration::from_secs(self.request_timeout_secs.saturating_mul(attempts))
            + Duration::from_millis(max_total_backoff_ms(
                self.max_retries,
                self.retry_backoff_base_ms,
            ))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Calls `{base_url}/chat/completions` once per note.
pub struct ChatAnalyzer {
    client: Client,
    endpoint: Url,
    config: ChatConfig,
}

impl ChatAnalyzer {
    /// Build the HTTP client and validate the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`AnalyzerError::Unavailable`] if `base_url` is not a URL.
    pub fn new(config: ChatConfig) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("xhsop/0.1 (note-analysis)")
            .build()?;

        let raw = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&raw).map_err(|e| {
            AnalyzerError::Unavailable(format!("invalid base URL '{}': {e}", config.base_url))
        })?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, AnalyzerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|source| AnalyzerError::Decode {
                context: "chat completion response".to_string(),
                source,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AnalyzerError::EmptyResponse)
    }
}

impl Analyzer for ChatAnalyzer {
    async fn analyze(&self, note: &NoteRecord) -> Result<String, AnalyzerError> {
        let limits = PromptLimits {
            max_content_chars: self.config.max_content_chars,
            max_images: self.config.max_images,
        };
        let request = ChatRequest {
            model: &self.config.model,
            messages: build_messages(note, limits),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let content = retry_with_backoff(
            self.config.max_retries,
            self.config.retry_backoff_base_ms,
            || self.complete(&request),
        )
        .await?;

        tracing::debug!(
            note_id = %note.note_id,
            len = content.len(),
            "model call succeeded"
        );
        Ok(content)
    }
}
