use quiz_core::adaptive::resolve_label;
use quiz_core::model::{
    AnswerRecord, Choice, Difficulty, Question, QuestionId, Session, SessionId, UserContext,
};
use sqlx::Row;
use tracing::warn;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

/// Decode a stored difficulty label. Labels off the ladder become `Medium`.
fn difficulty_from_label(field: &'static str, owner: &str, label: &str) -> Difficulty {
    let resolved = resolve_label(label);
    if !resolved.recognized {
        warn!(
            field,
            owner,
            label,
            "unrecognized difficulty label in store, defaulting to Medium"
        );
    }
    resolved.level
}

pub(crate) fn choices_to_json(choices: &[Choice]) -> Result<String, StorageError> {
    serde_json::to_string(choices).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let choices_json: String = row.try_get("choices").map_err(ser)?;
    let choices: Vec<Choice> = serde_json::from_str(&choices_json).map_err(ser)?;
    let difficulty_label: String = row.try_get("difficulty").map_err(ser)?;

    Ok(Question {
        difficulty: difficulty_from_label("difficulty", &id, &difficulty_label),
        id: QuestionId::new(id),
        text: row.try_get("text").map_err(ser)?,
        choices,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        subtopic: row.try_get("subtopic").map_err(ser)?,
        solution: row.try_get("solution").map_err(ser)?,
        curriculum_system: row.try_get("curriculum_system").map_err(ser)?,
        grade: row.try_get("grade").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_answer_row(
    session_id: &str,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AnswerRecord, StorageError> {
    let label: String = row.try_get("difficulty").map_err(ser)?;
    Ok(AnswerRecord {
        question_id: QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?),
        user_answer: row.try_get("user_answer").map_err(ser)?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        difficulty: difficulty_from_label("answer.difficulty", session_id, &label),
        topic: row.try_get("topic").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
    answers: Vec<AnswerRecord>,
) -> Result<Session, StorageError> {
    let raw_id: String = row.try_get("id").map_err(ser)?;
    let id: SessionId = raw_id.parse().map_err(ser)?;

    let user_context = UserContext::from_persisted(
        row.try_get("curriculum_system").map_err(ser)?,
        row.try_get("grade").map_err(ser)?,
        row.try_get("target_difficulty").map_err(ser)?,
    );

    let index = usize_from_i64(
        "current_question_index",
        row.try_get::<i64, _>("current_question_index").map_err(ser)?,
    )?;
    let label: String = row.try_get("current_difficulty").map_err(ser)?;
    let version_i64: i64 = row.try_get("version").map_err(ser)?;
    let version = u64::try_from(version_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid version: {version_i64}")))?;

    Session::from_persisted(
        id,
        user_context,
        index,
        difficulty_from_label("current_difficulty", &raw_id, &label),
        answers,
        row.try_get("is_finished").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        version,
    )
    .map_err(ser)
}
