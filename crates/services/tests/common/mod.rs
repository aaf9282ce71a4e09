#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Barrier;

use quiz_core::model::{Choice, Difficulty, Question, QuestionId, Session, SessionId};
use services::llm::{LlmError, LlmErrorKind, LlmProvider, LlmRequest};
use storage::repository::{
    InMemoryRepository, QuestionFilter, QuestionRepository, SessionRepository, Storage,
    StorageError,
};

pub const SUMMARY_TEXT: &str = "Steady work across topics.";
pub const EXPLANATION_TEXT: &str = "Divide both sides by 2 to get $x = 2$.";
pub const ANALYSIS_TEXT: &str = "Focus on geometry next.";

/// Fake provider that answers by prompt kind and counts calls.
#[derive(Default)]
pub struct FakeLlm {
    generated: Mutex<Vec<Result<String, LlmError>>>,
    pub generation_calls: AtomicUsize,
    pub explanation_calls: AtomicUsize,
    pub other_calls: AtomicUsize,
    pub fail_text: bool,
}

impl FakeLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A provider whose explanation, summary and analysis calls all fail.
    pub fn failing_text() -> Arc<Self> {
        Arc::new(Self {
            fail_text: true,
            ..Self::default()
        })
    }

    /// Queue replies for question generation, served in order.
    pub fn push_generated(&self, reply: Result<String, LlmError>) {
        self.generated.lock().unwrap().insert(0, reply);
    }

    pub fn generation_calls(&self) -> usize {
        self.generation_calls.load(Ordering::SeqCst)
    }

    pub fn explanation_calls(&self) -> usize {
        self.explanation_calls.load(Ordering::SeqCst)
    }

    pub fn other_calls(&self) -> usize {
        self.other_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.generation_calls() + self.explanation_calls() + self.other_calls()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        if request.prompt.starts_with("Generate one") {
            self.generation_calls.fetch_add(1, Ordering::SeqCst);
            return self.generated.lock().unwrap().pop().unwrap_or_else(|| {
                Err(LlmError::new(LlmErrorKind::Unavailable, "no scripted reply"))
            });
        }

        if self.fail_text {
            self.other_calls.fetch_add(1, Ordering::SeqCst);
            return Err(LlmError::new(LlmErrorKind::Timeout, "slow"));
        }
        if request.prompt.contains("Explain step by step") {
            self.explanation_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(format!("<p>{EXPLANATION_TEXT}</p>"));
        }
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains("answered incorrectly") {
            Ok(ANALYSIS_TEXT.to_string())
        } else {
            Ok(SUMMARY_TEXT.to_string())
        }
    }
}

pub fn generated_json(topic: &str) -> String {
    generated_json_answering(topic, "A")
}

pub fn generated_json_answering(topic: &str, correct: &str) -> String {
    format!(
        r#"```json
{{
  "text": "What is $3 \\times 4$?",
  "choices": [
    {{"id": "A", "text": "$12$"}},
    {{"id": "B", "text": "$7$"}},
    {{"id": "C", "text": "$1$"}},
    {{"id": "D", "text": "$34$"}}
  ],
  "correctAnswer": "{correct}",
  "topic": "{topic}"
}}
```"#
    )
}

/// Store wrapper that counts writes and can hold loads at a barrier.
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: InMemoryRepository,
    writes: Arc<AtomicUsize>,
    gate: Arc<Mutex<Option<Arc<Barrier>>>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(&self) -> Storage {
        Storage {
            sessions: Arc::new(self.clone()),
            questions: Arc::new(self.clone()),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `parties` session loads wait for each other.
    pub fn hold_loads(&self, parties: usize) {
        *self.gate.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }

    pub fn release_loads(&self) {
        *self.gate.lock().unwrap() = None;
    }
}

#[async_trait]
impl SessionRepository for CountingStore {
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let session = self.inner.get_session(id).await?;
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        Ok(session)
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_session(session).await
    }
}

#[async_trait]
impl QuestionRepository for CountingStore {
    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
        self.inner.get_question(id).await
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        self.inner.get_questions(ids).await
    }

    async fn find_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        self.inner.find_questions(filter, limit).await
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_question(question).await
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_question(question).await
    }

    async fn set_explanation(&self, id: &QuestionId, explanation: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_explanation(id, explanation).await
    }
}

/// Question store whose explanation write-back always fails.
#[derive(Clone, Default)]
pub struct BrokenWriteBack {
    pub inner: InMemoryRepository,
}

#[async_trait]
impl QuestionRepository for BrokenWriteBack {
    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
        self.inner.get_question(id).await
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        self.inner.get_questions(ids).await
    }

    async fn find_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        self.inner.find_questions(filter, limit).await
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.inner.upsert_question(question).await
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.inner.insert_question(question).await
    }

    async fn set_explanation(&self, _id: &QuestionId, _explanation: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }
}

pub fn question(id: &str, difficulty: Difficulty, topic: &str) -> Question {
    Question {
        id: QuestionId::new(id),
        text: format!("Solve {id}"),
        choices: vec![
            Choice::new("A", "$2$"),
            Choice::new("B", "$3$"),
            Choice::new("C", "$4$"),
            Choice::new("D", "$5$"),
        ],
        correct_answer: "A".into(),
        explanation: None,
        topic: Some(topic.into()),
        subtopic: None,
        solution: None,
        difficulty,
        curriculum_system: "US".into(),
        grade: "G9".into(),
        created_at: None,
    }
}

/// Seeds two questions at every difficulty, bypassing the write counter.
pub async fn seed_ladder(store: &CountingStore) {
    for (difficulty, topic) in [
        (Difficulty::Easy, "Algebra"),
        (Difficulty::Medium, "Algebra"),
        (Difficulty::Hard, "Geometry"),
    ] {
        for n in 1..=2 {
            let id = format!("US_G9_{topic}_{}{n}", difficulty.rank());
            store
                .inner
                .upsert_question(&question(&id, difficulty, topic))
                .await
                .unwrap();
        }
    }
}
