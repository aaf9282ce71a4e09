use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Difficulty, QuestionId, SessionId};

/// Number of questions in every adaptive session.
pub const TOTAL_QUESTIONS: usize = 3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    #[error("user context is missing a curriculum system")]
    MissingSystem,

    #[error("user context is missing a grade")]
    MissingGrade,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session is already finished")]
    Finished,

    #[error("question {0} was already answered in this session")]
    AlreadyAnswered(QuestionId),

    #[error("question index {index} does not match {answers} recorded answers")]
    IndexMismatch { index: usize, answers: usize },

    #[error("finished flag ({finished}) disagrees with question index {index}")]
    FinishedMismatch { finished: bool, index: usize },
}

//
// ─── USER CONTEXT ──────────────────────────────────────────────────────────────
//

/// Caller-supplied context, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContextDraft {
    pub system: Option<String>,
    pub grade: Option<String>,
    pub target_difficulty: Option<String>,
}

impl UserContextDraft {
    #[must_use]
    pub fn new(system: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            grade: Some(grade.into()),
            target_difficulty: None,
        }
    }

    /// Require a non-blank curriculum system and grade.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` naming the first missing field.
    pub fn validate(self) -> Result<UserContext, ContextError> {
        let system = non_blank(self.system).ok_or(ContextError::MissingSystem)?;
        let grade = non_blank(self.grade).ok_or(ContextError::MissingGrade)?;
        Ok(UserContext {
            system,
            grade,
            target_difficulty: non_blank(self.target_difficulty),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validated, immutable context of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    system: String,
    grade: String,
    target_difficulty: Option<String>,
}

impl UserContext {
    /// Rehydrate a context that was validated before it was stored.
    #[must_use]
    pub fn from_persisted(system: String, grade: String, target_difficulty: Option<String>) -> Self {
        Self {
            system,
            grade,
            target_difficulty,
        }
    }

    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    #[must_use]
    pub fn grade(&self) -> &str {
        &self.grade
    }

    #[must_use]
    pub fn target_difficulty(&self) -> Option<&str> {
        self.target_difficulty.as_deref()
    }
}

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// One graded answer. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub user_answer: String,
    pub is_correct: bool,
    pub difficulty: Difficulty,
    pub topic: String,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Lifecycle of a stored session. A session that was never started has no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    InProgress,
    Finished,
}

/// One student's run through a fixed-length adaptive question sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    user_context: UserContext,
    current_question_index: usize,
    current_difficulty: Difficulty,
    answers: Vec<AnswerRecord>,
    is_finished: bool,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    version: u64,
}

impl Session {
    /// Create an unsaved session at `Medium` difficulty.
    #[must_use]
    pub fn start(id: SessionId, user_context: UserContext, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_context,
            current_question_index: 0,
            current_difficulty: Difficulty::Medium,
            answers: Vec::new(),
            is_finished: false,
            created_at,
            version: 0,
        }
    }

    /// Rehydrate a session from storage, checking the index/answers invariants.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::IndexMismatch` or `FinishedMismatch` when the
    /// stored fields contradict each other.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_context: UserContext,
        current_question_index: usize,
        current_difficulty: Difficulty,
        answers: Vec<AnswerRecord>,
        is_finished: bool,
        created_at: DateTime<Utc>,
        version: u64,
    ) -> Result<Self, SessionStateError> {
        if current_question_index != answers.len() {
            return Err(SessionStateError::IndexMismatch {
                index: current_question_index,
                answers: answers.len(),
            });
        }
        if is_finished != (current_question_index >= TOTAL_QUESTIONS) {
            return Err(SessionStateError::FinishedMismatch {
                finished: is_finished,
                index: current_question_index,
            });
        }

        Ok(Self {
            id,
            user_context,
            current_question_index,
            current_difficulty,
            answers,
            is_finished,
            created_at,
            version,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_context(&self) -> &UserContext {
        &self.user_context
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn current_difficulty(&self) -> Difficulty {
        self.current_difficulty
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of successful saves this session has been through.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version the store must currently hold for the next save to succeed.
    ///
    /// `None` means the session has never been stored.
    #[must_use]
    pub fn expected_version(&self) -> Option<u64> {
        (self.version > 0).then_some(self.version)
    }

    /// Record that a save with [`Session::expected_version`] succeeded.
    pub fn mark_persisted(&mut self) {
        self.version += 1;
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_finished {
            SessionState::Finished
        } else {
            SessionState::InProgress
        }
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    /// Ids of every question already answered, in answer order.
    #[must_use]
    pub fn answered_ids(&self) -> Vec<QuestionId> {
        self.answers.iter().map(|a| a.question_id.clone()).collect()
    }

    #[must_use]
    pub fn has_answered(&self, question_id: &QuestionId) -> bool {
        self.answers.iter().any(|a| &a.question_id == question_id)
    }

    /// Append a graded answer and advance the question index.
    ///
    /// Marks the session finished once `TOTAL_QUESTIONS` answers are recorded.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Finished` if the session is finished, or
    /// `AlreadyAnswered` if the question was answered earlier in this session.
    pub fn record_answer(&mut self, answer: AnswerRecord) -> Result<(), SessionStateError> {
        if self.is_finished {
            return Err(SessionStateError::Finished);
        }
        if self.has_answered(&answer.question_id) {
            return Err(SessionStateError::AlreadyAnswered(answer.question_id));
        }

        self.answers.push(answer);
        self.current_question_index += 1;
        if self.current_question_index >= TOTAL_QUESTIONS {
            self.is_finished = true;
        }
        Ok(())
    }

    /// Move to `difficulty` for the next question.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.current_difficulty = difficulty;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
