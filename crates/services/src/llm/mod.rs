//! Text-generation provider contract.
//!
//! [`LlmProvider`] is the single seam between the engine and a hosted model:
//! one prompt in, free text out. Failures carry an [`LlmErrorKind`] so callers
//! and [`retry::RetryingProvider`] can tell transient faults from permanent ones.

pub mod openai;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use retry::{RetryPolicy, RetryingProvider};

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum LlmErrorKind {
    Timeout,
    Unavailable,
    Internal,
    RateLimited,
    InvalidRequest,
    Unauthorized,
    EmptyResponse,
    /// No provider is configured.
    Disabled,
}

impl LlmErrorKind {
    /// Whether a later attempt with the same request may succeed.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Unavailable | Self::Internal | Self::RateLimited
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::EmptyResponse => "empty_response",
            Self::Disabled => "disabled",
        }
    }
}

/// A failed provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("llm {}: {message}", kind.as_str())]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    #[must_use]
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// One completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    /// Optional system instruction sent ahead of the prompt.
    pub system: Option<String>,
    pub prompt: String,
}

impl LlmRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Trait for text-generation backends.
///
/// Implementations must be safe to share across tasks. A call is cancelled by
/// dropping its future.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete `request`, returning the raw response text.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` tagged with the failure kind.
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: LlmProvider + ?Sized> LlmProvider for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}
