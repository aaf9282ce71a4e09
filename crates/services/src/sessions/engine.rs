use std::sync::Arc;

use tracing::{debug, info};

use quiz_core::Clock;
use quiz_core::adaptive::next_difficulty;
use quiz_core::grading::grade;
use quiz_core::model::{
    AnswerRecord, QuestionId, Session, SessionId, SessionStateError, TOTAL_QUESTIONS,
    UserContextDraft,
};
use storage::repository::{SessionRepository, Storage, StorageError};

use super::outcome::{AnswerOutcome, StartedSession};
use super::report::ReportBuilder;
use crate::config::{EngineConfig, bounded};
use crate::error::EngineError;
use crate::explanations::ExplanationCache;
use crate::llm::LlmProvider;
use crate::questions::{QuestionQuery, QuestionSource};

/// Session state machine: starts sessions, grades answers, adapts difficulty,
/// and produces the final report.
///
/// Every operation either persists one consistent session snapshot or leaves
/// the stored session untouched. Saves are guarded by the session version, so a
/// concurrent submission against the same session fails with
/// [`EngineError::Conflict`] instead of overwriting.
#[derive(Clone)]
pub struct SessionEngine {
    sessions: Arc<dyn SessionRepository>,
    source: QuestionSource,
    reports: ReportBuilder,
    clock: Clock,
    config: EngineConfig,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        storage: &Storage,
        llm: Arc<dyn LlmProvider>,
        clock: Clock,
        config: EngineConfig,
    ) -> Self {
        let source = QuestionSource::new(
            Arc::clone(&storage.questions),
            Arc::clone(&llm),
            clock,
            config,
        );
        let explanations =
            ExplanationCache::new(Arc::clone(&storage.questions), Arc::clone(&llm), config);
        let reports = ReportBuilder::new(source.clone(), explanations, llm, config);
        Self {
            sessions: Arc::clone(&storage.sessions),
            source,
            reports,
            clock,
            config,
        }
    }

    /// Start a session at `Medium` and return its first question.
    ///
    /// The first question is obtained before the session is stored, so a failed
    /// lookup or generation leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidContext` if the curriculum system or grade is
    /// missing, `Generation` if no question could be produced, and
    /// `Store`/`Timeout` on store failures.
    pub async fn start(&self, draft: UserContextDraft) -> Result<StartedSession, EngineError> {
        let context = draft.validate()?;
        let mut session = Session::start(SessionId::generate(), context, self.clock.now());

        let first = self
            .source
            .get_question(&QuestionQuery {
                curriculum_system: session.user_context().system(),
                grade: session.user_context().grade(),
                difficulty: session.current_difficulty(),
                topic: None,
                exclude: &[],
            })
            .await?;

        self.persist(&mut session).await?;
        info!(
            session_id = %session.id(),
            system = session.user_context().system(),
            grade = session.user_context().grade(),
            question_id = %first.id,
            "started session"
        );

        Ok(StartedSession {
            session_id: session.id(),
            total_questions: TOTAL_QUESTIONS,
            first_question: first.sanitize(),
        })
    }

    /// Grade `answer` for `question_id` and advance the session.
    ///
    /// Correctness always comes from the stored question. For a non-final
    /// answer the next question is fetched before the session is saved, so a
    /// failure at any point leaves the stored session as it was.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` / `QuestionNotFound` for unknown ids.
    /// - `SessionFinished` if the session already has all its answers.
    /// - `AlreadyAnswered` if `question_id` was answered earlier in the session.
    /// - `Generation` if the next question could not be produced.
    /// - `Conflict` if the session was saved concurrently.
    /// - `Store` / `Timeout` on store failures.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<AnswerOutcome, EngineError> {
        let mut session = self.load(session_id).await?;
        if session.is_finished() {
            return Err(EngineError::SessionFinished);
        }

        let question_id = QuestionId::new(question_id);
        if session.has_answered(&question_id) {
            return Err(EngineError::AlreadyAnswered(question_id));
        }

        let question = self
            .source
            .load(&question_id)
            .await?
            .ok_or_else(|| EngineError::QuestionNotFound(question_id.to_string()))?;

        let is_correct = grade(answer, &question.correct_answer);
        session
            .record_answer(AnswerRecord {
                question_id: question.id.clone(),
                user_answer: answer.to_string(),
                is_correct,
                difficulty: question.difficulty,
                topic: question.topic_or_general().to_string(),
            })
            .map_err(state_error)?;
        debug!(
            session_id = %session.id(),
            question_id = %question.id,
            is_correct,
            index = session.current_question_index(),
            "recorded answer"
        );

        if session.is_finished() {
            self.persist(&mut session).await?;
            info!(
                session_id = %session.id(),
                score = session.correct_count(),
                "session finished"
            );
            let report = self.reports.build(&session).await;
            return Ok(AnswerOutcome::Finished(Box::new(report)));
        }

        let next = next_difficulty(session.current_difficulty(), is_correct);
        session.set_difficulty(next);

        let answered = session.answered_ids();
        let next_question = self
            .source
            .get_question(&QuestionQuery {
                curriculum_system: session.user_context().system(),
                grade: session.user_context().grade(),
                difficulty: next,
                topic: None,
                exclude: &answered,
            })
            .await?;

        self.persist(&mut session).await?;
        debug!(
            session_id = %session.id(),
            difficulty = %next,
            question_id = %next_question.id,
            "served next question"
        );

        Ok(AnswerOutcome::Next(next_question.sanitize()))
    }

    /// Current stored state of a session.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionNotFound` for unknown ids and
    /// `Store`/`Timeout` on store failures.
    pub async fn session(&self, session_id: &str) -> Result<Session, EngineError> {
        self.load(session_id).await
    }

    async fn load(&self, session_id: &str) -> Result<Session, EngineError> {
        let not_found = || EngineError::SessionNotFound(session_id.to_string());
        let id: SessionId = session_id.trim().parse().map_err(|_| not_found())?;
        bounded(self.config.io_timeout, self.sessions.get_session(id))
            .await?
            .ok_or_else(not_found)
    }

    async fn persist(&self, session: &mut Session) -> Result<(), EngineError> {
        bounded(self.config.io_timeout, self.sessions.save_session(session)).await?;
        session.mark_persisted();
        Ok(())
    }
}

fn state_error(err: SessionStateError) -> EngineError {
    match err {
        SessionStateError::Finished => EngineError::SessionFinished,
        SessionStateError::AlreadyAnswered(id) => EngineError::AlreadyAnswered(id),
        other => EngineError::Store(StorageError::Serialization(other.to_string())),
    }
}
