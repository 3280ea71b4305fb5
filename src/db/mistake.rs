use color_eyre::Result;
use sqlx::{QueryBuilder, Sqlite};

use super::models::{
    MistakeCategoryCount, MistakeDifficultyCount, MistakeEntry, MistakeFilter, MistakeStats,
};
use super::{Db, Page};

const MISTAKE_SELECT: &str = r#"
    SELECT mb.id, mb.question_id, mb.is_mastered, mb.created_at AS added_at,
           q.title, q.content, q.type, q.options, q.correct_answer, q.explanation,
           q.difficulty, q.category_id, cat.name AS category_name
    FROM mistake_books mb
    JOIN questions q ON q.id = mb.question_id
    LEFT JOIN categories cat ON cat.id = q.category_id
    WHERE mb.user_id = "#;

pub enum AddMistakeOutcome {
    Added(MistakeEntry),
    AlreadyExists,
    QuestionNotFound,
}

impl Db {
    pub async fn list_mistakes(
        &self,
        user_id: i64,
        filter: &MistakeFilter,
        page: Page,
    ) -> Result<(Vec<MistakeEntry>, i64)> {
        let mut count = QueryBuilder::new(
            "SELECT COUNT(*) FROM mistake_books mb JOIN questions q ON q.id = mb.question_id WHERE mb.user_id = ",
        );
        count.push_bind(user_id);
        push_mistake_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(MISTAKE_SELECT);
        query.push_bind(user_id);
        push_mistake_filter(&mut query, filter);
        query
            .push(" ORDER BY mb.created_at DESC, mb.id DESC LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let mistakes = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((mistakes, total))
    }

    pub async fn add_mistake(&self, user_id: i64, question_id: i64) -> Result<AddMistakeOutcome> {
        if self.find_question(question_id).await?.is_none() {
            return Ok(AddMistakeOutcome::QuestionNotFound);
        }

        let id: Option<i64> = sqlx::query_scalar(
            r#"INSERT INTO mistake_books (user_id, question_id) VALUES (?, ?)
               ON CONFLICT (user_id, question_id) DO NOTHING
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(id) = id else {
            return Ok(AddMistakeOutcome::AlreadyExists);
        };

        let mut query = QueryBuilder::new(MISTAKE_SELECT);
        query.push_bind(user_id).push(" AND mb.id = ").push_bind(id);
        let entry = query.build_query_as().fetch_one(&self.pool).await?;

        tracing::info!(user_id, question_id, "question added to mistake book");
        Ok(AddMistakeOutcome::Added(entry))
    }

    /// Removes one of the user's own entries by entry id.
    pub async fn remove_mistake(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mistake_books WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_mistakes(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM mistake_books WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id, "mistake book cleared: {} entries", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub async fn set_mistake_mastered(
        &self,
        user_id: i64,
        question_id: i64,
        mastered: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE mistake_books SET is_mastered = ? WHERE user_id = ? AND question_id = ?",
        )
        .bind(mastered)
        .bind(user_id)
        .bind(question_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mistake_stats(&self, user_id: i64) -> Result<MistakeStats> {
        let (total_mistakes, mastered_mistakes): (i64, i64) = sqlx::query_as(
            r#"SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_mastered THEN 1 ELSE 0 END), 0)
               FROM mistake_books WHERE user_id = ?"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let category_stats: Vec<MistakeCategoryCount> = sqlx::query_as(
            r#"SELECT c.id AS category_id, c.name AS category_name, COUNT(mb.id) AS mistake_count
               FROM mistake_books mb
               JOIN questions q ON q.id = mb.question_id
               JOIN categories c ON c.id = q.category_id
               WHERE mb.user_id = ?
               GROUP BY c.id, c.name
               ORDER BY mistake_count DESC, c.id ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let difficulty_stats: Vec<MistakeDifficultyCount> = sqlx::query_as(
            r#"SELECT q.difficulty, COUNT(mb.id) AS mistake_count
               FROM mistake_books mb
               JOIN questions q ON q.id = mb.question_id
               WHERE mb.user_id = ?
               GROUP BY q.difficulty
               ORDER BY mistake_count DESC, q.difficulty ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(MistakeStats {
            total_mistakes,
            mastered_mistakes,
            category_stats,
            difficulty_stats,
        })
    }
}

fn push_mistake_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &MistakeFilter) {
    if let Some(category_id) = filter.category_id {
        query.push(" AND q.category_id = ").push_bind(category_id);
    }
    if let Some(difficulty) = filter.difficulty {
        query.push(" AND q.difficulty = ").push_bind(difficulty.as_str());
    }
    if let Some(mastered) = filter.is_mastered {
        query.push(" AND mb.is_mastered = ").push_bind(mastered);
    }
}
