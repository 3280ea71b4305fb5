use color_eyre::Result;
use sqlx::{types::Json, QueryBuilder, Sqlite};

use super::models::{AnswerHistoryEntry, AnswerHistoryFilter, AnswerRecord, SubmissionResult};
use super::{Db, Page};
use crate::quiz::{answer_mask, AnswerError, QuestionType};

pub enum SubmitOutcome {
    Graded(SubmissionResult),
    QuestionNotFound,
    InvalidAnswer(AnswerError),
}

impl Db {
    /// Grades and records one submission.
    ///
    /// The record for `(user, question)` is created or overwritten, and the
    /// mistake book entry is added on a wrong answer and removed on a right one,
    /// all in one transaction.
    pub async fn submit_answer(
        &self,
        user_id: i64,
        question_id: i64,
        user_answer: i64,
        time_spent: i64,
    ) -> Result<SubmitOutcome> {
        let mut tx = self.pool.begin().await?;

        let question: Option<(QuestionType, Json<Vec<String>>, i64, String)> = sqlx::query_as(
            "SELECT type, options, correct_answer, explanation FROM questions WHERE id = ?",
        )
        .bind(question_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((kind, Json(options), correct_answer, explanation)) = question else {
            return Ok(SubmitOutcome::QuestionNotFound);
        };

        let is_correct = match answer_mask::grade(kind, options.len(), correct_answer, user_answer) {
            Ok(is_correct) => is_correct,
            Err(e) => return Ok(SubmitOutcome::InvalidAnswer(e)),
        };

        let updated: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM answer_records WHERE user_id = ? AND question_id = ?)",
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO answer_records (user_id, question_id, user_answer, is_correct, time_spent)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (user_id, question_id) DO UPDATE
               SET user_answer = excluded.user_answer,
                   is_correct = excluded.is_correct,
                   time_spent = excluded.time_spent,
                   answered_at = datetime('now')"#,
        )
        .bind(user_id)
        .bind(question_id)
        .bind(user_answer)
        .bind(is_correct)
        .bind(time_spent.max(0))
        .execute(&mut *tx)
        .await?;

        if is_correct {
            sqlx::query("DELETE FROM mistake_books WHERE user_id = ? AND question_id = ?")
                .bind(user_id)
                .bind(question_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                r#"INSERT INTO mistake_books (user_id, question_id) VALUES (?, ?)
                   ON CONFLICT (user_id, question_id) DO NOTHING"#,
            )
            .bind(user_id)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id, question_id, is_correct, updated, "answer recorded");
        Ok(SubmitOutcome::Graded(SubmissionResult {
            is_correct,
            correct_answer,
            explanation,
            updated,
        }))
    }

    pub async fn find_answer_record(&self, user_id: i64, question_id: i64) -> Result<Option<AnswerRecord>> {
        let record = sqlx::query_as(
            r#"SELECT id, user_id, question_id, user_answer, is_correct, time_spent, answered_at, created_at
               FROM answer_records WHERE user_id = ? AND question_id = ?"#,
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn answer_history(
        &self,
        user_id: i64,
        filter: &AnswerHistoryFilter,
        page: Page,
    ) -> Result<(Vec<AnswerHistoryEntry>, i64)> {
        let mut count = QueryBuilder::new(
            "SELECT COUNT(*) FROM answer_records ar JOIN questions q ON q.id = ar.question_id WHERE ar.user_id = ",
        );
        count.push_bind(user_id);
        push_history_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(
            r#"SELECT ar.id, ar.question_id, q.title AS question_title, q.type AS question_type,
                      q.category_id, cat.name AS category_name, ar.user_answer, q.correct_answer,
                      ar.is_correct, ar.time_spent, ar.answered_at
               FROM answer_records ar
               JOIN questions q ON q.id = ar.question_id
               LEFT JOIN categories cat ON cat.id = q.category_id
               WHERE ar.user_id = "#,
        );
        query.push_bind(user_id);
        push_history_filter(&mut query, filter);
        query
            .push(" ORDER BY ar.answered_at DESC, ar.id DESC LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let entries = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((entries, total))
    }
}

fn push_history_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &AnswerHistoryFilter) {
    if let Some(category_id) = filter.category_id {
        query.push(" AND q.category_id = ").push_bind(category_id);
    }
    if let Some(is_correct) = filter.is_correct {
        query.push(" AND ar.is_correct = ").push_bind(is_correct);
    }
}
