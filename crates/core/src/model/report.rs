use serde::Serialize;

use crate::model::{AnswerRecord, Difficulty, QuestionId};

/// Accuracy for one topic across a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAccuracy {
    pub topic: String,
    /// Integer percentage, rounded down.
    pub accuracy: u32,
    pub total: u32,
    #[serde(skip)]
    pub correct: u32,
}

/// One answered question as shown in the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerHistoryEntry {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub difficulty: Difficulty,
    pub topic: String,
    pub explanation: Option<String>,
    pub text: String,
}

/// Performance report produced once a session finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub score: u32,
    pub total: u32,
    pub score_percent: u32,
    pub recommendation_text: String,
    pub final_difficulty: Difficulty,
    pub answer_history: Vec<AnswerHistoryEntry>,
    pub topic_analysis: Vec<TopicAccuracy>,
}

/// Score and per-topic counters derived from a session's answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub score: u32,
    pub total: u32,
    pub score_percent: u32,
    pub topics: Vec<TopicAccuracy>,
}

impl ScoreCard {
    /// Tally `answers` against a fixed `total`.
    ///
    /// Topics keep the order in which they first appear.
    #[must_use]
    pub fn tally(answers: &[AnswerRecord], total: u32) -> Self {
        let mut topics: Vec<TopicAccuracy> = Vec::new();
        let mut score = 0_u32;

        for answer in answers {
            if answer.is_correct {
                score = score.saturating_add(1);
            }
            let existing = topics.iter().position(|t| t.topic == answer.topic);
            let entry = match existing {
                Some(idx) => &mut topics[idx],
                None => {
                    topics.push(TopicAccuracy {
                        topic: answer.topic.clone(),
                        accuracy: 0,
                        total: 0,
                        correct: 0,
                    });
                    let last = topics.len() - 1;
                    &mut topics[last]
                }
            };
            entry.total = entry.total.saturating_add(1);
            if answer.is_correct {
                entry.correct = entry.correct.saturating_add(1);
            }
        }

        for topic in &mut topics {
            topic.accuracy = floor_percent(topic.correct, topic.total);
        }

        Self {
            score,
            total,
            score_percent: floor_percent(score, total),
            topics,
        }
    }
}

/// `floor(100 * part / whole)`, or 0 when `whole` is 0.
#[must_use]
pub fn floor_percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let pct = u64::from(part) * 100 / u64::from(whole);
    u32::try_from(pct).unwrap_or(u32::MAX)
}
