//! Write-through cache of per-question explanations.

use std::sync::Arc;

use tracing::{info, warn};

use quiz_core::model::Question;
use storage::repository::QuestionRepository;

use crate::config::{EngineConfig, bounded};
use crate::error::{EngineError, GenerationError};
use crate::llm::{LlmProvider, LlmRequest};
use crate::text::clean_markup;

/// Text shown when an explanation could not be produced.
pub const EXPLANATION_UNAVAILABLE: &str = "Explanation currently unavailable.";

const EXPLANATION_SYSTEM: &str = "You are a patient math tutor. Explain solutions step by step \
for a student. Use LaTeX only for math with numbers and Latin letters, wrapped in $...$. \
Do not use HTML tags. Markdown bold is allowed.";

/// Returns a question's stored explanation, generating and storing one on a miss.
#[derive(Clone)]
pub struct ExplanationCache {
    questions: Arc<dyn QuestionRepository>,
    llm: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl ExplanationCache {
    #[must_use]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        llm: Arc<dyn LlmProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            questions,
            llm,
            config,
        }
    }

    /// Explanation for `question`, which should be freshly loaded from the store.
    ///
    /// A non-blank stored explanation is returned without calling the LLM.
    /// Otherwise the generated text is cleaned, written back to the question,
    /// and returned. A failed write-back is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Generation` or `Timeout` if the LLM call fails.
    pub async fn get_or_create(&self, question: &Question) -> Result<String, EngineError> {
        if let Some(cached) = question.cached_explanation() {
            info!(question_id = %question.id, "explanation cache hit");
            return Ok(cached.to_string());
        }

        let request = LlmRequest::new(explanation_prompt(question)).with_system(EXPLANATION_SYSTEM);
        let raw = bounded(self.config.io_timeout, async {
            self.llm
                .complete(&request)
                .await
                .map_err(GenerationError::from)
        })
        .await?;

        let explanation = clean_markup(&raw);
        if explanation.is_empty() {
            return Err(GenerationError::Parse("explanation is empty after cleanup".into()).into());
        }

        if let Err(err) = bounded(
            self.config.io_timeout,
            self.questions.set_explanation(&question.id, &explanation),
        )
        .await
        {
            warn!(
                question_id = %question.id,
                error = %err,
                "failed to cache generated explanation"
            );
        } else {
            info!(question_id = %question.id, "cached generated explanation");
        }

        Ok(explanation)
    }
}

fn explanation_prompt(question: &Question) -> String {
    let choices = question
        .choices
        .iter()
        .map(|c| format!("{}) {}", c.id, c.text))
        .collect::<Vec<_>>()
        .join("\n");

    let guidance = match question.solution.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(solution) => format!(
            "Base your explanation on the reference solution below, but do not copy it. \
For each step, add why it holds.\n\nReference solution: {solution}"
        ),
        None => "No reference solution is available. Solve the problem yourself and explain \
why each formula or theorem applies."
            .to_string(),
    };

    format!(
        "The correct answer to the following problem is {answer}. Explain step by step how to reach it.\n\n\
Question: {text}\n\nChoices:\n{choices}\n\nCorrect answer: {answer}\n\n{guidance}\n\n\
Start directly with the solution. Keep it concise.",
        answer = question.correct_answer,
        text = question.text,
    )
}
