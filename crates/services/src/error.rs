//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{ContextError, QuestionId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::llm::LlmError;

/// Coarse class of an [`EngineError`], for mapping onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed caller input. Not retried.
    Validation,
    /// Session or question absent.
    NotFound,
    /// The LLM call or its parse failed. The caller may try again.
    Generation,
    /// The backing store failed, timed out or rejected a stale write.
    Store,
}

/// Errors raised while producing a question or other text with the LLM.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("generated question could not be parsed: {0}")]
    Parse(String),
}

/// Errors emitted by the session engine and the submission flow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    InvalidContext(#[from] ContextError),
    #[error("question {0} was already answered in this session")]
    AlreadyAnswered(QuestionId),
    #[error("session is already finished")]
    SessionFinished,
    #[error("no answers were submitted")]
    EmptySubmission,
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("question {0} not found")]
    QuestionNotFound(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("session was modified concurrently")]
    Conflict,
    #[error("store or llm call timed out")]
    Timeout,
    #[error(transparent)]
    Store(StorageError),
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidContext(_)
            | Self::AlreadyAnswered(_)
            | Self::SessionFinished
            | Self::EmptySubmission => ErrorKind::Validation,
            Self::SessionNotFound(_) | Self::QuestionNotFound(_) => ErrorKind::NotFound,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Conflict | Self::Timeout | Self::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Conflict,
            other => Self::Store(other),
        }
    }
}

/// Errors emitted while bootstrapping services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
