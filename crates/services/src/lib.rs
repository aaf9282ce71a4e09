#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod explanations;
pub mod llm;
pub mod questions;
pub mod sessions;
pub mod submission;
pub mod text;

pub use quiz_core::Clock;

pub use app_services::AdaptiveServices;
pub use config::EngineConfig;
pub use error::{AppServicesError, EngineError, ErrorKind, GenerationError};
pub use explanations::{EXPLANATION_UNAVAILABLE, ExplanationCache};
pub use llm::{LlmError, LlmErrorKind, LlmProvider, LlmRequest};
pub use questions::{QuestionQuery, QuestionSource};
pub use sessions::{AnswerOutcome, SessionEngine, StartedSession};
pub use submission::{Submission, SubmissionReport, TestSubmissionService, TimeInfo};
