//! Answer grading.
//!
//! Grading is an exact, case-sensitive string comparison. No whitespace or case
//! normalization is applied.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::QuestionId;

/// Grade a single answer against the recorded correct answer.
#[must_use]
pub fn grade(user_answer: &str, correct_answer: &str) -> bool {
    user_answer == correct_answer
}

/// Grading-relevant fields of a stored question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerKey {
    pub correct_answer: Option<String>,
    pub category: Option<String>,
    pub text: Option<String>,
    pub solution: Option<String>,
}

/// Result of grading one submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub id: QuestionId,
    pub user_answer: String,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    pub category: Option<String>,
    #[serde(skip)]
    pub text: Option<String>,
    #[serde(skip)]
    pub solution: Option<String>,
}

/// Output of [`grade_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeSheet {
    pub results: Vec<GradedAnswer>,
    /// Category of every incorrect answer that has one. Not deduplicated.
    pub wrong_categories: Vec<String>,
}

impl GradeSheet {
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct).count()
    }
}

/// Grade every submitted answer.
///
/// An answer whose question is unknown, or has no recorded correct answer, is
/// graded incorrect.
#[must_use]
pub fn grade_all(
    answers: &BTreeMap<QuestionId, String>,
    keys: &HashMap<QuestionId, AnswerKey>,
) -> GradeSheet {
    let mut sheet = GradeSheet::default();

    for (id, user_answer) in answers {
        let key = keys.get(id).cloned().unwrap_or_default();
        let is_correct = match key.correct_answer.as_deref() {
            Some(correct) if !correct.is_empty() => grade(user_answer, correct),
            _ => false,
        };

        if !is_correct {
            if let Some(category) = &key.category {
                sheet.wrong_categories.push(category.clone());
            }
        }

        sheet.results.push(GradedAnswer {
            id: id.clone(),
            user_answer: user_answer.clone(),
            correct_answer: key.correct_answer,
            is_correct,
            category: key.category,
            text: key.text,
            solution: key.solution,
        });
    }

    sheet
}
