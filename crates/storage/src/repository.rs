use async_trait::async_trait;
use quiz_core::model::{Difficulty, Question, QuestionId, Session, SessionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Equality filter used to look up candidate questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFilter {
    pub curriculum_system: String,
    pub grade: String,
    pub difficulty: Difficulty,
    pub topic: Option<String>,
}

impl QuestionFilter {
    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        question.curriculum_system == self.curriculum_system
            && question.grade == self.grade
            && question.difficulty == self.difficulty
            && self
                .topic
                .as_ref()
                .is_none_or(|topic| question.topic.as_ref() == Some(topic))
    }
}

/// Repository contract for test sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or the record cannot be decoded.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// Persist a session, guarded by its expected version.
    ///
    /// A session whose `expected_version()` is `None` must not exist yet;
    /// otherwise the stored version must equal the expected one. The stored
    /// copy is written with the version incremented by one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the version guard fails.
    async fn save_session(&self, session: &Session) -> Result<(), StorageError>;
}

/// Repository contract for questions.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or the record cannot be decoded.
    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError>;

    /// Fetch every question among `ids` that exists. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// Return up to `limit` questions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn find_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Persist or replace a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Store a new question, never replacing an existing one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a question with the same id exists.
    async fn insert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Merge an explanation into an existing question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist.
    async fn set_explanation(&self, id: &QuestionId, explanation: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn session_count(&self) -> Result<usize, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let stored_version = guard.get(&session.id()).map(Session::version);
        if stored_version != session.expected_version() {
            return Err(StorageError::Conflict);
        }

        let mut stored = session.clone();
        stored.mark_persisted();
        guard.insert(stored.id(), stored);
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn find_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .values()
            .filter(|q| filter.matches(q))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&question.id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn set_explanation(&self, id: &QuestionId, explanation: &str) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let question = guard.get_mut(id).ok_or(StorageError::NotFound)?;
        question.explanation = Some(explanation.to_string());
        Ok(())
    }
}

/// Aggregates session and question repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub questions: Arc<dyn QuestionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo);
        Self {
            sessions,
            questions,
        }
    }
}
