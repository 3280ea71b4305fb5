use color_eyre::{eyre::OptionExt, Result};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteExecutor};

use super::models::{Question, QuestionDraft, QuestionFilter};
use super::{like_pattern, Db, Page};
use crate::quiz::Difficulty;

pub(super) const QUESTION_SELECT: &str = r#"
    SELECT q.id, q.title, q.content, q.type, q.options, q.correct_answer, q.explanation,
           q.difficulty, q.category_id, cat.name AS category_name, q.creator_id,
           q.created_at, q.updated_at
    FROM questions q
    LEFT JOIN categories cat ON cat.id = q.category_id
    WHERE 1 = 1
"#;

impl Db {
    pub async fn list_questions(
        &self,
        filter: &QuestionFilter,
        page: Page,
    ) -> Result<(Vec<Question>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM questions q WHERE 1 = 1");
        push_question_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(QUESTION_SELECT);
        push_question_filter(&mut query, filter);
        query
            .push(" ORDER BY q.created_at DESC, q.id DESC LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let questions = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((questions, total))
    }

    /// Every matching question in id order, for exports.
    pub async fn all_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let mut query = QueryBuilder::new(QUESTION_SELECT);
        push_question_filter(&mut query, filter);
        query.push(" ORDER BY q.id ASC");

        let questions = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(questions)
    }

    pub async fn find_question(&self, id: i64) -> Result<Option<Question>> {
        fetch_question(&self.pool, id).await
    }

    pub async fn random_questions(
        &self,
        count: i64,
        category_id: Option<i64>,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<Question>> {
        let filter = QuestionFilter {
            category_id,
            difficulty,
            ..Default::default()
        };

        let mut query = QueryBuilder::new(QUESTION_SELECT);
        push_question_filter(&mut query, &filter);
        query.push(" ORDER BY RANDOM() LIMIT ").push_bind(count);

        let questions = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(questions)
    }

    pub async fn create_question(&self, draft: &QuestionDraft, creator_id: Option<i64>) -> Result<Question> {
        let mut tx = self.pool.begin().await?;

        let id = insert_question(&mut *tx, draft, creator_id).await?;
        let question = fetch_question(&mut *tx, id)
            .await?
            .ok_or_eyre("question vanished after insert")?;
        tx.commit().await?;

        tracing::info!(question_id = id, "question created: {}", draft.title);
        Ok(question)
    }

    pub async fn update_question(&self, id: i64, draft: &QuestionDraft) -> Result<Option<Question>> {
        let mut tx = self.pool.begin().await?;

        let updated = overwrite_question(&mut *tx, id, draft).await?;
        if !updated {
            return Ok(None);
        }
        let question = fetch_question(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(question_id = id, "question updated");
        Ok(question)
    }

    /// Deletes a question, returning its title when it existed.
    pub async fn delete_question(&self, id: i64) -> Result<Option<String>> {
        let title = sqlx::query_scalar("DELETE FROM questions WHERE id = ? RETURNING title")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(title)
    }

    pub async fn delete_questions(&self, ids: &[i64]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM questions WHERE id IN (");
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        list.push_unseparated(") RETURNING title");

        let titles: Vec<String> = query.build_query_scalar().fetch_all(&self.pool).await?;
        tracing::info!("deleted {} questions", titles.len());
        Ok(titles)
    }

    pub async fn category_exists(&self, id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

pub(super) async fn fetch_question<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<Question>> {
    let question = sqlx::query_as(&format!("{QUESTION_SELECT} AND q.id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(question)
}

pub(super) async fn insert_question<'e, E: SqliteExecutor<'e>>(
    executor: E,
    draft: &QuestionDraft,
    creator_id: Option<i64>,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"INSERT INTO questions
               (title, content, type, options, correct_answer, explanation, difficulty,
                category_id, creator_id)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
           RETURNING id"#,
    )
    .bind(&draft.title)
    .bind(&draft.content)
    .bind(draft.kind)
    .bind(Json(&draft.options))
    .bind(draft.correct_answer)
    .bind(&draft.explanation)
    .bind(draft.difficulty)
    .bind(draft.category_id)
    .bind(creator_id)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub(super) async fn overwrite_question<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    draft: &QuestionDraft,
) -> Result<bool> {
    let result = sqlx::query(
        r#"UPDATE questions
           SET title = ?, content = ?, type = ?, options = ?, correct_answer = ?,
               explanation = ?, difficulty = ?, category_id = ?, updated_at = datetime('now')
           WHERE id = ?"#,
    )
    .bind(&draft.title)
    .bind(&draft.content)
    .bind(draft.kind)
    .bind(Json(&draft.options))
    .bind(draft.correct_answer)
    .bind(&draft.explanation)
    .bind(draft.difficulty)
    .bind(draft.category_id)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn push_question_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &QuestionFilter) {
    if let Some(category_id) = filter.category_id {
        query.push(" AND q.category_id = ").push_bind(category_id);
    }
    if let Some(difficulty) = filter.difficulty {
        query.push(" AND q.difficulty = ").push_bind(difficulty.as_str());
    }
    if let Some(kind) = filter.kind {
        query.push(" AND q.type = ").push_bind(kind.as_str());
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        query
            .push(" AND (q.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR q.content LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(creator_id) = filter.creator_id {
        query.push(" AND q.creator_id = ").push_bind(creator_id);
    }
    if let Some(start) = &filter.start_date {
        query.push(" AND q.created_at >= ").push_bind(start.clone());
    }
    if let Some(end) = &filter.end_date {
        query.push(" AND q.created_at <= ").push_bind(end.clone());
    }
}
