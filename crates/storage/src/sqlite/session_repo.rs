use quiz_core::model::{Session, SessionId};

use super::{
    SqliteRepository,
    mapping::{map_answer_row, map_session_row, u64_to_i64, usize_to_i64},
};
use crate::repository::{SessionRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let key = id.value().to_string();

        // one transaction so the row and its answers come from the same commit
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let Some(row) = sqlx::query(
            r"
            SELECT
                id, curriculum_system, grade, target_difficulty, current_question_index,
                current_difficulty, is_finished, created_at, version
            FROM test_sessions
            WHERE id = ?1
            ",
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        else {
            tx.rollback().await.map_err(conn)?;
            return Ok(None);
        };

        let answer_rows = sqlx::query(
            r"
            SELECT question_id, user_answer, is_correct, difficulty, topic
            FROM session_answers
            WHERE session_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(&key)
        .fetch_all(&mut *tx)
        .await
        .map_err(conn)?;
        tx.commit().await.map_err(conn)?;

        let answers = answer_rows
            .iter()
            .map(|r| map_answer_row(&key, r))
            .collect::<Result<Vec<_>, _>>()?;

        map_session_row(&row, answers).map(Some)
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let key = session.id().value().to_string();
        let ctx = session.user_context();
        let index = usize_to_i64("current_question_index", session.current_question_index())?;
        let next_version = u64_to_i64("version", session.version() + 1)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let written = match session.expected_version() {
            None => sqlx::query(
                r"
                INSERT INTO test_sessions (
                    id, curriculum_system, grade, target_difficulty, current_question_index,
                    current_difficulty, is_finished, created_at, version
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO NOTHING
                ",
            )
            .bind(&key)
            .bind(ctx.system())
            .bind(ctx.grade())
            .bind(ctx.target_difficulty())
            .bind(index)
            .bind(session.current_difficulty().as_str())
            .bind(session.is_finished())
            .bind(session.created_at())
            .bind(next_version)
            .execute(&mut *tx)
            .await
            .map_err(conn)?,
            Some(expected) => sqlx::query(
                r"
                UPDATE test_sessions SET
                    current_question_index = ?2,
                    current_difficulty = ?3,
                    is_finished = ?4,
                    version = ?5
                WHERE id = ?1 AND version = ?6
                ",
            )
            .bind(&key)
            .bind(index)
            .bind(session.current_difficulty().as_str())
            .bind(session.is_finished())
            .bind(next_version)
            .bind(u64_to_i64("version", expected)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?,
        };

        if written.rows_affected() == 0 {
            tx.rollback().await.map_err(conn)?;
            return Err(StorageError::Conflict);
        }

        // answers are append-only, so only rows past the stored count are new
        let stored: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM session_answers WHERE session_id = ?1",
        )
        .bind(&key)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;
        let stored = usize::try_from(stored)
            .map_err(|_| StorageError::Serialization(format!("invalid answer count: {stored}")))?;

        for (position, answer) in session.answers().iter().enumerate().skip(stored) {
            sqlx::query(
                r"
                INSERT INTO session_answers (
                    session_id, position, question_id, user_answer, is_correct, difficulty, topic
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(&key)
            .bind(usize_to_i64("position", position)?)
            .bind(answer.question_id.as_str())
            .bind(answer.user_answer.as_str())
            .bind(answer.is_correct)
            .bind(answer.difficulty.as_str())
            .bind(answer.topic.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
