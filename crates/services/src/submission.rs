//! One-shot test submission: grade a whole answer sheet at once, explain the
//! misses, and ask for a weakness analysis.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quiz_core::grading::{AnswerKey, GradedAnswer, grade_all};
use quiz_core::model::{Question, QuestionId};
use storage::repository::Storage;

use crate::config::{EngineConfig, bounded};
use crate::error::{EngineError, GenerationError};
use crate::explanations::{EXPLANATION_UNAVAILABLE, ExplanationCache};
use crate::llm::{LlmProvider, LlmRequest};
use crate::questions::QuestionSource;
use crate::Clock;

/// Returned without an LLM call when every answer is correct.
pub const ALL_CORRECT_MESSAGE: &str = "You answered every question correctly. Great work!";

/// Returned when the weakness analysis cannot be generated.
pub const ANALYSIS_UNAVAILABLE: &str =
    "Weakness analysis is currently unavailable. Review the explanations for the questions you missed.";

const ANALYSIS_SYSTEM: &str = "You are a math learning coach. Diagnose a student's weak areas \
from the categories of the questions they missed and recommend what to study next. Be concise \
and encouraging.";

/// Seconds allowed for a test when the caller does not say otherwise.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 600;

/// Timing of a submitted test, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    pub total_time_spent: u64,
    #[serde(default = "default_time_limit")]
    pub time_limit: u64,
    #[serde(default)]
    pub is_overtime: bool,
}

fn default_time_limit() -> u64 {
    DEFAULT_TIME_LIMIT_SECS
}

/// A full answer sheet keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub answers: BTreeMap<QuestionId, String>,
    #[serde(default)]
    pub time_info: Option<TimeInfo>,
}

/// One graded answer plus the explanation shown for a miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    #[serde(flatten)]
    pub graded: GradedAnswer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_solution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub test_results: Vec<SubmittedAnswer>,
    pub ai_analysis_report: String,
}

impl SubmissionReport {
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.graded.is_correct).count()
    }
}

#[derive(Clone)]
pub struct TestSubmissionService {
    source: QuestionSource,
    explanations: ExplanationCache,
    llm: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl TestSubmissionService {
    #[must_use]
    pub fn new(
        storage: &Storage,
        llm: Arc<dyn LlmProvider>,
        clock: Clock,
        config: EngineConfig,
    ) -> Self {
        Self {
            source: QuestionSource::new(
                Arc::clone(&storage.questions),
                Arc::clone(&llm),
                clock,
                config,
            ),
            explanations: ExplanationCache::new(
                Arc::clone(&storage.questions),
                Arc::clone(&llm),
                config,
            ),
            llm,
            config,
        }
    }

    /// Grade `submission`, attach explanations to incorrect answers, and
    /// produce a weakness analysis.
    ///
    /// Unknown question ids are graded incorrect. Explanation and analysis
    /// failures degrade to static text.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::EmptySubmission` when no answers are given and
    /// `Store`/`Timeout` if the questions cannot be loaded.
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionReport, EngineError> {
        if submission.answers.is_empty() {
            return Err(EngineError::EmptySubmission);
        }

        let ids: Vec<QuestionId> = submission.answers.keys().cloned().collect();
        let questions: HashMap<QuestionId, Question> = self
            .source
            .load_many(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect();

        let keys: HashMap<QuestionId, AnswerKey> = questions
            .values()
            .map(|q| (q.id.clone(), answer_key(q)))
            .collect();
        let sheet = grade_all(&submission.answers, &keys);
        let all_correct = sheet.correct_count() == sheet.results.len();
        info!(
            answers = sheet.results.len(),
            correct = sheet.correct_count(),
            "graded submission"
        );

        let mut test_results = Vec::with_capacity(sheet.results.len());
        for graded in sheet.results {
            let ai_solution = match questions.get(&graded.id) {
                Some(question) if !graded.is_correct => Some(self.explain(question).await),
                _ => None,
            };
            test_results.push(SubmittedAnswer {
                graded,
                ai_solution,
            });
        }

        let ai_analysis_report = self
            .analyze_weakness(all_correct, &sheet.wrong_categories, submission.time_info)
            .await;

        Ok(SubmissionReport {
            test_results,
            ai_analysis_report,
        })
    }

    async fn explain(&self, question: &Question) -> String {
        match self.explanations.get_or_create(question).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    question_id = %question.id,
                    error = %err,
                    "explanation unavailable for submission"
                );
                EXPLANATION_UNAVAILABLE.to_string()
            }
        }
    }

    async fn analyze_weakness(
        &self,
        all_correct: bool,
        wrong_categories: &[String],
        time: Option<TimeInfo>,
    ) -> String {
        if all_correct {
            return ALL_CORRECT_MESSAGE.to_string();
        }

        let request =
            LlmRequest::new(weakness_prompt(wrong_categories, time)).with_system(ANALYSIS_SYSTEM);
        let result = bounded(self.config.io_timeout, async {
            self.llm
                .complete(&request)
                .await
                .map_err(GenerationError::from)
        })
        .await;

        match result {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => ANALYSIS_UNAVAILABLE.to_string(),
            Err(err) => {
                warn!(error = %err, "weakness analysis failed, using fallback");
                ANALYSIS_UNAVAILABLE.to_string()
            }
        }
    }
}

fn answer_key(question: &Question) -> AnswerKey {
    AnswerKey {
        correct_answer: Some(question.correct_answer.clone()),
        category: Some(question.topic_or_general().to_string()),
        text: Some(question.text.clone()),
        solution: question.solution.clone(),
    }
}

fn minutes_seconds(secs: u64) -> String {
    format!("{} min {} s", secs / 60, secs % 60)
}

fn time_context(time: TimeInfo) -> String {
    let limit = format!("- Time limit: {} min", time.time_limit / 60);
    let spent = format!("- Time spent: {}", minutes_seconds(time.total_time_spent));
    if time.is_overtime {
        let over = time.total_time_spent.saturating_sub(time.time_limit);
        format!(
            "\n\nTiming:\n{limit}\n{spent}\n- Over the limit by: {}\n\
- The student went over the time limit. Include advice on time management.",
            minutes_seconds(over)
        )
    } else {
        let left = time.time_limit.saturating_sub(time.total_time_spent);
        format!(
            "\n\nTiming:\n{limit}\n{spent}\n- Time left: {}\n\
- The student finished within the time limit. Mention this positively.",
            minutes_seconds(left)
        )
    }
}

fn weakness_prompt(wrong_categories: &[String], time: Option<TimeInfo>) -> String {
    let categories = serde_json::to_string(wrong_categories).unwrap_or_default();
    let timing = time.map(time_context).unwrap_or_default();
    format!(
        "Categories of the questions the student answered incorrectly: {categories}{timing}\n\n\
Diagnose the student's weaknesses and recommend what to study next."
    )
}
