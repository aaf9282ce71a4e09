use std::collections::HashMap;

use quiz_core::model::{Question, QuestionId};

use super::{
    SqliteRepository,
    mapping::{choices_to_json, map_question_row},
};
use crate::repository::{QuestionFilter, QuestionRepository, StorageError};

const QUESTION_COLUMNS: &str = r"
    id, text, choices, correct_answer, explanation, topic, subtopic, solution,
    difficulty, curriculum_system, grade, created_at
";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN (");
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id.as_str());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id.clone(), question);
        }

        // keep the caller's order, skip ids with no record
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn find_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let mut sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions
             WHERE curriculum_system = ?1 AND grade = ?2 AND difficulty = ?3"
        );
        if filter.topic.is_some() {
            sql.push_str(" AND topic = ?5");
        }
        sql.push_str(" ORDER BY id LIMIT ?4");

        let mut q = sqlx::query(&sql)
            .bind(filter.curriculum_system.as_str())
            .bind(filter.grade.as_str())
            .bind(filter.difficulty.as_str())
            .bind(i64::from(limit));
        if let Some(topic) = &filter.topic {
            q = q.bind(topic.as_str());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_question_row).collect()
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (
                id, text, choices, correct_answer, explanation, topic, subtopic, solution,
                difficulty, curriculum_system, grade, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert
                text = excluded.text,
                choices = excluded.choices,
                correct_answer = excluded.correct_answer,
                explanation = excluded.explanation,
                topic = excluded.topic,
                subtopic = excluded.subtopic,
                solution = excluded.solution,
                difficulty = excluded.difficulty,
                curriculum_system = excluded.curriculum_system,
                grade = excluded.grade
            ",
        )
        .bind(question.id.as_str())
        .bind(question.text.as_str())
        .bind(choices_to_json(&question.choices)?)
        .bind(question.correct_answer.as_str())
        .bind(question.explanation.as_deref())
        .bind(question.topic.as_deref())
        .bind(question.subtopic.as_deref())
        .bind(question.solution.as_deref())
        .bind(question.difficulty.as_str())
        .bind(question.curriculum_system.as_str())
        .bind(question.grade.as_str())
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO questions (
                id, text, choices, correct_answer, explanation, topic, subtopic, solution,
                difficulty, curriculum_system, grade, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(question.id.as_str())
        .bind(question.text.as_str())
        .bind(choices_to_json(&question.choices)?)
        .bind(question.correct_answer.as_str())
        .bind(question.explanation.as_deref())
        .bind(question.topic.as_deref())
        .bind(question.subtopic.as_deref())
        .bind(question.solution.as_deref())
        .bind(question.difficulty.as_str())
        .bind(question.curriculum_system.as_str())
        .bind(question.grade.as_str())
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn set_explanation(&self, id: &QuestionId, explanation: &str) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE questions SET explanation = ?1 WHERE id = ?2")
            .bind(explanation)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
