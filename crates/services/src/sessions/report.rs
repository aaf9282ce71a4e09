use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use quiz_core::model::{
    AnswerHistoryEntry, Question, QuestionId, Report, ScoreCard, Session, TOTAL_QUESTIONS,
};

use crate::config::{EngineConfig, bounded};
use crate::error::GenerationError;
use crate::explanations::{EXPLANATION_UNAVAILABLE, ExplanationCache};
use crate::llm::{LlmProvider, LlmRequest};
use crate::questions::QuestionSource;

/// Shown in the history when an answered question is no longer in the store.
pub const QUESTION_TEXT_UNAVAILABLE: &str = "Question text unavailable";

/// Static summary used when the LLM summary cannot be produced.
#[must_use]
pub fn fallback_summary(score_percent: u32) -> &'static str {
    if score_percent < 50 {
        "We recommend reviewing earlier concepts."
    } else if score_percent > 80 {
        "You are ready for advanced challenges!"
    } else {
        "You have a solid foundation. Keep practicing to improve further!"
    }
}

/// Builds the end-of-session [`Report`]. Never fails: every LLM or store
/// problem degrades to static text.
#[derive(Clone)]
pub(crate) struct ReportBuilder {
    source: QuestionSource,
    explanations: ExplanationCache,
    llm: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl ReportBuilder {
    pub(crate) fn new(
        source: QuestionSource,
        explanations: ExplanationCache,
        llm: Arc<dyn LlmProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            explanations,
            llm,
            config,
        }
    }

    pub(crate) async fn build(&self, session: &Session) -> Report {
        let total = u32::try_from(TOTAL_QUESTIONS).unwrap_or(u32::MAX);
        let card = ScoreCard::tally(session.answers(), total);

        let ids = session.answered_ids();
        let questions: HashMap<QuestionId, Question> = match self.source.load_many(&ids).await {
            Ok(found) => found.into_iter().map(|q| (q.id.clone(), q)).collect(),
            Err(err) => {
                warn!(
                    session_id = %session.id(),
                    error = %err,
                    "could not load answered questions for report"
                );
                HashMap::new()
            }
        };

        let mut answer_history = Vec::with_capacity(session.answers().len());
        for answer in session.answers() {
            let question = questions.get(&answer.question_id);
            let explanation = match question {
                Some(q) if !answer.is_correct => Some(self.explain(q).await),
                Some(q) => q.cached_explanation().map(str::to_string),
                None => None,
            };
            answer_history.push(AnswerHistoryEntry {
                question_id: answer.question_id.clone(),
                is_correct: answer.is_correct,
                difficulty: answer.difficulty,
                topic: answer.topic.clone(),
                explanation,
                text: question.map_or(QUESTION_TEXT_UNAVAILABLE, |q| q.text.as_str()).to_string(),
            });
        }

        let recommendation_text = self.summary(session, &card).await;

        Report {
            score: card.score,
            total: card.total,
            score_percent: card.score_percent,
            recommendation_text,
            final_difficulty: session.current_difficulty(),
            answer_history,
            topic_analysis: card.topics,
        }
    }

    async fn explain(&self, question: &Question) -> String {
        match self.explanations.get_or_create(question).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    question_id = %question.id,
                    error = %err,
                    "explanation unavailable for report"
                );
                EXPLANATION_UNAVAILABLE.to_string()
            }
        }
    }

    async fn summary(&self, session: &Session, card: &ScoreCard) -> String {
        let request = LlmRequest::new(summary_prompt(session, card));
        let result = bounded(self.config.io_timeout, async {
            self.llm
                .complete(&request)
                .await
                .map_err(GenerationError::from)
        })
        .await;

        match result {
            Ok(text) if !text.trim().is_empty() => {
                debug!(session_id = %session.id(), "generated performance summary");
                text.trim().to_string()
            }
            Ok(_) => {
                warn!(session_id = %session.id(), "empty performance summary, using fallback");
                fallback_summary(card.score_percent).to_string()
            }
            Err(err) => {
                warn!(
                    session_id = %session.id(),
                    error = %err,
                    "performance summary failed, using fallback"
                );
                fallback_summary(card.score_percent).to_string()
            }
        }
    }
}

fn summary_prompt(session: &Session, card: &ScoreCard) -> String {
    let mut topics = String::new();
    for topic in &card.topics {
        let _ = write!(
            topics,
            "\n  - {}: {}% of {} question(s)",
            topic.topic, topic.accuracy, topic.total
        );
    }

    format!(
        "Analyze the following student math test performance and write a short, encouraging \
summary (2-3 sentences). Explain why the recommended level fits, based on their accuracy and \
the difficulty they reached.\n\n\
Stats:\n\
- Grade: {grade}\n\
- Score: {score}/{total}\n\
- Topic accuracy:{topics}\n\
- Final difficulty reached: {difficulty}\n\n\
Output plain text only.",
        grade = session.user_context().grade(),
        score = card.score,
        total = card.total,
        difficulty = session.current_difficulty(),
    )
}
