//! Question lookup with on-demand generation.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{debug, info, warn};

use quiz_core::Clock;
use quiz_core::model::{Choice, Difficulty, Question, QuestionId};
use storage::repository::{QuestionFilter, QuestionRepository};

use crate::config::{EngineConfig, bounded};
use crate::error::{EngineError, GenerationError};
use crate::llm::{LlmProvider, LlmRequest};
use crate::text::strip_code_fence;

/// Number of choices a generated question must carry.
pub const GENERATED_CHOICES: usize = 4;

/// Ids tried for one generated question before giving up on a clash.
const MAX_ID_ATTEMPTS: u32 = 5;

/// What the caller needs a question for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionQuery<'a> {
    pub curriculum_system: &'a str,
    pub grade: &'a str,
    pub difficulty: Difficulty,
    pub topic: Option<&'a str>,
    /// Ids that must not be offered again.
    pub exclude: &'a [QuestionId],
}

/// Finds a stored question, or asks the LLM for a new one when none fits.
#[derive(Clone)]
pub struct QuestionSource {
    questions: Arc<dyn QuestionRepository>,
    llm: Arc<dyn LlmProvider>,
    clock: Clock,
    config: EngineConfig,
}

impl QuestionSource {
    #[must_use]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        llm: Arc<dyn LlmProvider>,
        clock: Clock,
        config: EngineConfig,
    ) -> Self {
        Self {
            questions,
            llm,
            clock,
            config,
        }
    }

    /// Load a question by id.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` or `Timeout` if the store cannot be read.
    pub async fn load(&self, id: &QuestionId) -> Result<Option<Question>, EngineError> {
        bounded(self.config.io_timeout, self.questions.get_question(id)).await
    }

    /// Load every question among `ids` that exists.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` or `Timeout` if the store cannot be read.
    pub async fn load_many(&self, ids: &[QuestionId]) -> Result<Vec<Question>, EngineError> {
        bounded(self.config.io_timeout, self.questions.get_questions(ids)).await
    }

    /// Pick a random stored candidate for `query`, generating one if none remain.
    ///
    /// Candidates whose id is excluded or malformed are skipped.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store`/`Timeout` on store failures and
    /// `EngineError::Generation` when the fallback generation fails.
    pub async fn get_question(&self, query: &QuestionQuery<'_>) -> Result<Question, EngineError> {
        let filter = QuestionFilter {
            curriculum_system: query.curriculum_system.to_string(),
            grade: query.grade.to_string(),
            difficulty: query.difficulty,
            topic: query.topic.map(str::to_string),
        };

        let candidates = bounded(
            self.config.io_timeout,
            self.questions
                .find_questions(&filter, self.config.candidate_batch),
        )
        .await?;

        let fetched = candidates.len();
        let valid: Vec<Question> = candidates
            .into_iter()
            .filter(|q| q.id.is_well_formed() && !query.exclude.contains(&q.id))
            .collect();

        let picked = valid.choose(&mut rand::rng()).cloned();
        if let Some(question) = picked {
            debug!(
                question_id = %question.id,
                fetched,
                eligible = valid.len(),
                "selected stored question"
            );
            return Ok(question);
        }

        info!(
            difficulty = %query.difficulty,
            fetched,
            "no eligible stored question, generating one"
        );
        self.generate_question(query).await
    }

    /// Ask the LLM for a new question, then persist it under a synthesized id.
    ///
    /// The question is only ever inserted. If the id is already taken, a
    /// numeric suffix is appended and the insert is tried again.
    ///
    /// Not retried here. The caller decides whether to try again.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Generation` if the LLM fails or its reply does not
    /// parse into a complete question, `Conflict` if every candidate id is taken,
    /// and `Store`/`Timeout` if it cannot be saved.
    pub async fn generate_question(
        &self,
        query: &QuestionQuery<'_>,
    ) -> Result<Question, EngineError> {
        let request = LlmRequest::new(generation_prompt(query));
        let raw = bounded(self.config.io_timeout, async {
            self.llm
                .complete(&request)
                .await
                .map_err(GenerationError::from)
        })
        .await?;

        let generated = parse_generated(&raw)?;
        let topic = generated
            .topic
            .clone()
            .filter(|t| !t.trim().is_empty());
        let base_id = QuestionId::synthesize(
            query.curriculum_system,
            query.grade,
            topic.as_deref().unwrap_or(""),
            self.clock.unix_millis(),
        );

        let mut question = Question {
            id: base_id.clone(),
            text: generated.text,
            choices: generated.choices,
            correct_answer: generated.correct_answer,
            explanation: generated.explanation.filter(|e| !e.trim().is_empty()),
            topic,
            subtopic: generated.subtopic,
            solution: None,
            difficulty: query.difficulty,
            curriculum_system: query.curriculum_system.to_string(),
            grade: query.grade.to_string(),
            created_at: Some(self.clock.now()),
        };

        let mut attempt = 1;
        loop {
            match bounded(
                self.config.io_timeout,
                self.questions.insert_question(&question),
            )
            .await
            {
                Ok(()) => break,
                Err(EngineError::Conflict) if attempt < MAX_ID_ATTEMPTS => {
                    attempt += 1;
                    debug!(question_id = %question.id, attempt, "generated id taken, suffixing");
                    question.id = QuestionId::new(format!("{base_id}_{attempt}"));
                }
                Err(err) => return Err(err),
            }
        }
        info!(question_id = %question.id, "stored generated question");

        Ok(question)
    }
}

fn generation_prompt(query: &QuestionQuery<'_>) -> String {
    let topic = query.topic.unwrap_or("General math for this grade");
    format!(
        r#"Generate one {difficulty} difficulty multiple-choice math question for grade {grade} of the {system} curriculum.
Topic: {topic}
Difficulty: {difficulty}

Reply with a single JSON object and nothing else.
Rules:
1. Wrap math in $...$ and escape LaTeX backslashes for JSON (write \\frac{{1}}{{2}}).
2. Do not escape % in plain text. Only use \% inside $...$.
3. Do not use LaTeX text formatting commands such as \textbf or \text.

{{
  "text": "Question text with math wrapped in $...$",
  "choices": [
    {{"id": "A", "text": "Option A"}},
    {{"id": "B", "text": "Option B"}},
    {{"id": "C", "text": "Option C"}},
    {{"id": "D", "text": "Option D"}}
  ],
  "correctAnswer": "A",
  "explanation": "Step-by-step solution",
  "topic": "Specific topic name",
  "subtopic": "Specific subtopic name"
}}"#,
        difficulty = query.difficulty,
        grade = query.grade,
        system = query.curriculum_system,
    )
}

/// Shape of the JSON object the generation prompt asks for.
#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(alias = "text_latex")]
    text: String,
    choices: Vec<Choice>,
    #[serde(rename = "correctAnswer", alias = "correct_answer")]
    correct_answer: String,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    subtopic: Option<String>,
}

fn parse_generated(raw: &str) -> Result<GeneratedQuestion, GenerationError> {
    let body = strip_code_fence(raw);
    let generated: GeneratedQuestion = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "generated question is not valid JSON");
        GenerationError::Parse(e.to_string())
    })?;

    if generated.text.trim().is_empty() {
        return Err(GenerationError::Parse("question text is empty".into()));
    }
    if generated.choices.len() != GENERATED_CHOICES {
        return Err(GenerationError::Parse(format!(
            "expected {GENERATED_CHOICES} choices, got {}",
            generated.choices.len()
        )));
    }
    if !generated
        .choices
        .iter()
        .any(|c| c.id == generated.correct_answer)
    {
        return Err(GenerationError::Parse(format!(
            "correct answer {:?} is not one of the choice ids",
            generated.correct_answer
        )));
    }

    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"```json
{
  "text_latex": "What is $2 + 2$?",
  "choices": [
    {"id": "A", "text": "$3$"},
    {"id": "B", "text": "$4$"},
    {"id": "C", "text": "$5$"},
    {"id": "D", "text": "$22$"}
  ],
  "correct_answer": "B",
  "explanation": "Add the numbers.",
  "topic": "Arithmetic"
}
```"#;

    #[test]
    fn parses_fenced_reply_with_legacy_field_names() {
        let generated = parse_generated(VALID).unwrap();
        assert_eq!(generated.text, "What is $2 + 2$?");
        assert_eq!(generated.correct_answer, "B");
        assert_eq!(generated.topic.as_deref(), Some("Arithmetic"));
        assert_eq!(generated.subtopic, None);
    }

    #[test]
    fn rejects_non_json_reply() {
        let err = parse_generated("Sure! Here is a question: ...").unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[test]
    fn rejects_wrong_choice_count() {
        let raw = r#"{"text": "Q", "choices": [{"id": "A", "text": "1"}], "correctAnswer": "A"}"#;
        let err = parse_generated(raw).unwrap_err();
        assert!(matches!(err, GenerationError::Parse(msg) if msg.contains("4 choices")));
    }

    #[test]
    fn rejects_answer_outside_choices() {
        let raw = r#"{"text": "Q", "choices": [
            {"id": "A", "text": "1"}, {"id": "B", "text": "2"},
            {"id": "C", "text": "3"}, {"id": "D", "text": "4"}
        ], "correctAnswer": "E"}"#;
        assert!(parse_generated(raw).is_err());
    }

    #[test]
    fn prompt_names_grade_and_difficulty() {
        let exclude = [];
        let query = QuestionQuery {
            curriculum_system: "US",
            grade: "G9",
            difficulty: Difficulty::Hard,
            topic: None,
            exclude: &exclude,
        };
        let prompt = generation_prompt(&query);
        assert!(prompt.contains("Hard difficulty"));
        assert!(prompt.contains("grade G9 of the US curriculum"));
        assert!(prompt.contains("\"correctAnswer\": \"A\""));
    }
}
