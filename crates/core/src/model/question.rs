use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, QuestionId};

/// Topic used when a question carries none.
pub const GENERAL_TOPIC: &str = "General";

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One multiple-choice option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
}

impl Choice {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A stored question, including the answer-revealing fields.
///
/// Deliberately not `Serialize`: the only way to hand a question to a test
/// taker is through [`Question::sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub choices: Vec<Choice>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    /// Reference step-by-step solution, when the question was authored with one.
    pub solution: Option<String>,
    pub difficulty: Difficulty,
    pub curriculum_system: String,
    pub grade: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Topic name, or `"General"` when the question has none.
    #[must_use]
    pub fn topic_or_general(&self) -> &str {
        self.topic
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(GENERAL_TOPIC)
    }

    /// The stored explanation, ignoring blank values.
    #[must_use]
    pub fn cached_explanation(&self) -> Option<&str> {
        self.explanation.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// Strip the correct answer, explanation and timestamps.
    #[must_use]
    pub fn sanitize(&self) -> SanitizedQuestion {
        SanitizedQuestion {
            id: self.id.clone(),
            text: self.text.clone(),
            choices: if self.choices.is_empty() {
                None
            } else {
                Some(self.choices.clone())
            },
            topic: self.topic_or_general().to_string(),
            difficulty: self.difficulty,
        }
    }
}

//
// ─── SANITIZED QUESTION ────────────────────────────────────────────────────────
//

/// Question payload safe to send to a test taker before they answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedQuestion {
    pub id: QuestionId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    pub topic: String,
    pub difficulty: Difficulty,
}
