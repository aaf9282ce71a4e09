use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{LlmError, LlmErrorKind, LlmProvider, LlmRequest};

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    /// Read `QUIZ_LLM_API_KEY`, `QUIZ_LLM_BASE_URL` and `QUIZ_LLM_MODEL`.
    ///
    /// Returns `None` when no non-blank API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_LLM_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZ_LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("QUIZ_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: Option<OpenAiConfig>,
}

impl OpenAiProvider {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(OpenAiConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<OpenAiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| LlmError::new(LlmErrorKind::Disabled, "no API key configured"))?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        let payload = ChatRequest {
            model: config.model.clone(),
            messages,
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::new(
                kind_for_status(status),
                format!("request failed with status {status}"),
            ));
        }

        let body: ChatResponse = response.json().await.map_err(from_transport)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::new(LlmErrorKind::EmptyResponse, "no content returned"))?;

        Ok(content.trim().to_string())
    }
}

fn kind_for_status(status: StatusCode) -> LlmErrorKind {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LlmErrorKind::Timeout,
        StatusCode::TOO_MANY_REQUESTS => LlmErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmErrorKind::Unauthorized,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => LlmErrorKind::Unavailable,
        s if s.is_server_error() => LlmErrorKind::Internal,
        _ => LlmErrorKind::InvalidRequest,
    }
}

fn from_transport(err: reqwest::Error) -> LlmError {
    let kind = if err.is_timeout() {
        LlmErrorKind::Timeout
    } else if err.is_decode() {
        LlmErrorKind::Internal
    } else if err.is_builder() {
        LlmErrorKind::InvalidRequest
    } else {
        LlmErrorKind::Unavailable
    };
    LlmError::new(kind, err.to_string())
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
