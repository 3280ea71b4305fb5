use chrono::NaiveDateTime;
use color_eyre::Result;
use sqlx::{QueryBuilder, Sqlite};

use super::models::{
    CategoryProgress, CategoryStat, OverviewStats, QuestionStat, SystemStats, UserOverallStats,
    UserStat,
};
use super::{Db, Page};
use crate::quiz::{
    stats::{self, QuestionSort, SortOrder, TimeWindows, UserSort},
    Difficulty,
};

/// Timestamp in the layout SQLite's `datetime('now')` produces.
fn sql_time(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Db {
    pub async fn user_overall_stats(&self, user_id: i64, windows: TimeWindows) -> Result<UserOverallStats> {
        let (total, correct, time_spent, today, week, month): (i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"SELECT COUNT(*),
                          COALESCE(SUM(CASE WHEN is_correct THEN 1 ELSE 0 END), 0),
                          COALESCE(SUM(time_spent), 0),
                          COALESCE(SUM(CASE WHEN answered_at >= ? THEN 1 ELSE 0 END), 0),
                          COALESCE(SUM(CASE WHEN answered_at >= ? THEN 1 ELSE 0 END), 0),
                          COALESCE(SUM(CASE WHEN answered_at >= ? THEN 1 ELSE 0 END), 0)
                   FROM answer_records WHERE user_id = ?"#,
            )
            .bind(sql_time(windows.today))
            .bind(sql_time(windows.week))
            .bind(sql_time(windows.month))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(UserOverallStats {
            total_answered: total,
            correct_answered: correct,
            accuracy_rate: stats::accuracy(correct, total),
            total_time_spent: time_spent,
            average_time_spent: stats::average(time_spent, total),
            today_answered: today,
            week_answered: week,
            month_answered: month,
        })
    }

    /// Per-category rollup of the categories the user has answered in.
    pub async fn user_category_stats(&self, user_id: i64) -> Result<Vec<CategoryStat>> {
        let mut rows: Vec<CategoryStat> = sqlx::query_as(
            r#"SELECT c.id AS category_id, c.name AS category_name,
                      COUNT(ar.id) AS total_answered,
                      COALESCE(SUM(CASE WHEN ar.is_correct THEN 1 ELSE 0 END), 0) AS correct_answered
               FROM answer_records ar
               JOIN questions q ON q.id = ar.question_id
               JOIN categories c ON c.id = q.category_id
               WHERE ar.user_id = ?
               GROUP BY c.id, c.name
               ORDER BY total_answered DESC, c.id ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for row in &mut rows {
            row.accuracy_rate = stats::accuracy(row.correct_answered, row.total_answered);
        }
        Ok(rows)
    }

    /// `None` when the category does not exist.
    pub async fn category_progress(&self, user_id: i64, category_id: i64) -> Result<Option<CategoryProgress>> {
        let row: Option<(String, i64, i64, i64)> = sqlx::query_as(
            r#"SELECT c.name,
                      (SELECT COUNT(*) FROM questions WHERE category_id = c.id),
                      (SELECT COUNT(*) FROM answer_records ar JOIN questions q ON q.id = ar.question_id
                        WHERE q.category_id = c.id AND ar.user_id = ?),
                      (SELECT COUNT(*) FROM answer_records ar JOIN questions q ON q.id = ar.question_id
                        WHERE q.category_id = c.id AND ar.user_id = ? AND ar.is_correct)
               FROM categories c WHERE c.id = ?"#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(category_name, total_questions, total_answered, correct_answered)| {
            CategoryProgress {
                category_id,
                category_name,
                total_questions,
                total_answered,
                correct_answered,
                accuracy_rate: stats::accuracy(correct_answered, total_answered),
            }
        }))
    }

    pub async fn question_stats(
        &self,
        category_id: Option<i64>,
        difficulty: Option<Difficulty>,
        sort: (QuestionSort, SortOrder),
        page: Page,
    ) -> Result<(Vec<QuestionStat>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM questions q WHERE 1 = 1");
        push_question_stat_filter(&mut count, category_id, difficulty);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(
            r#"SELECT q.id AS question_id, q.title AS question_title, c.name AS category_name,
                      q.difficulty,
                      COUNT(ar.id) AS total_answered,
                      COALESCE(SUM(CASE WHEN ar.is_correct THEN 1 ELSE 0 END), 0) AS correct_answered,
                      CASE WHEN COUNT(ar.id) > 0
                           THEN SUM(CASE WHEN ar.is_correct THEN 1 ELSE 0 END) * 100.0 / COUNT(ar.id)
                           ELSE 0.0 END AS accuracy_rate
               FROM questions q
               LEFT JOIN categories c ON c.id = q.category_id
               LEFT JOIN answer_records ar ON ar.question_id = q.id
               WHERE 1 = 1"#,
        );
        push_question_stat_filter(&mut query, category_id, difficulty);
        let (key, order) = sort;
        // Column and direction come from closed enums, never from the request.
        query
            .push(" GROUP BY q.id, q.title, c.name, q.difficulty")
            .push(format!(" ORDER BY {} {}, q.id ASC", key.column(), order.as_sql()))
            .push(" LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn user_stats(&self, sort: (UserSort, SortOrder), page: Page) -> Result<(Vec<UserStat>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'user'")
            .fetch_one(&self.pool)
            .await?;

        let (key, order) = sort;
        let sql = format!(
            r#"SELECT u.id AS user_id, u.nickname,
                      COUNT(ar.id) AS total_answered,
                      COALESCE(SUM(CASE WHEN ar.is_correct THEN 1 ELSE 0 END), 0) AS correct_answered,
                      CASE WHEN COUNT(ar.id) > 0
                           THEN SUM(CASE WHEN ar.is_correct THEN 1 ELSE 0 END) * 100.0 / COUNT(ar.id)
                           ELSE 0.0 END AS accuracy_rate,
                      COALESCE(SUM(ar.time_spent), 0) AS total_time_spent,
                      MAX(ar.answered_at) AS last_active_time
               FROM users u
               LEFT JOIN answer_records ar ON ar.user_id = u.id
               WHERE u.role = 'user'
               GROUP BY u.id, u.nickname
               ORDER BY {} {}, u.id ASC
               LIMIT ? OFFSET ?"#,
            key.column(),
            order.as_sql()
        );
        let rows = sqlx::query_as(&sql)
            .bind(page.size)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    pub async fn overview_stats(&self, windows: TimeWindows) -> Result<OverviewStats> {
        let (total_users, today_users, week_users, month_users) =
            self.windowed_count("users", "created_at", windows).await?;
        let (total_answers, today_answers, week_answers, month_answers) =
            self.windowed_count("answer_records", "answered_at", windows).await?;

        let (total_questions, total_categories): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM questions), (SELECT COUNT(*) FROM categories)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OverviewStats {
            total_users,
            total_questions,
            total_categories,
            total_answers,
            today_users,
            today_answers,
            week_users,
            week_answers,
            month_users,
            month_answers,
        })
    }

    /// Totals plus the number of users who answered since `active_since`.
    pub async fn system_stats(&self, active_since: NaiveDateTime) -> Result<SystemStats> {
        let (total_users, total_questions, total_categories, total_answers, total_mistakes, active_users) =
            sqlx::query_as(
                r#"SELECT (SELECT COUNT(*) FROM users),
                          (SELECT COUNT(*) FROM questions),
                          (SELECT COUNT(*) FROM categories),
                          (SELECT COUNT(*) FROM answer_records),
                          (SELECT COUNT(*) FROM mistake_books),
                          (SELECT COUNT(DISTINCT user_id) FROM answer_records WHERE answered_at >= ?)"#,
            )
            .bind(sql_time(active_since))
            .fetch_one(&self.pool)
            .await?;

        Ok(SystemStats {
            total_users,
            total_questions,
            total_categories,
            total_answers,
            total_mistakes,
            active_users,
        })
    }

    async fn windowed_count(
        &self,
        table: &'static str,
        column: &'static str,
        windows: TimeWindows,
    ) -> Result<(i64, i64, i64, i64)> {
        let sql = format!(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(CASE WHEN {column} >= ? THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN {column} >= ? THEN 1 ELSE 0 END), 0),
                      COALESCE(SUM(CASE WHEN {column} >= ? THEN 1 ELSE 0 END), 0)
               FROM {table}"#
        );
        let counts = sqlx::query_as(&sql)
            .bind(sql_time(windows.today))
            .bind(sql_time(windows.week))
            .bind(sql_time(windows.month))
            .fetch_one(&self.pool)
            .await?;
        Ok(counts)
    }
}

fn push_question_stat_filter(
    query: &mut QueryBuilder<'_, Sqlite>,
    category_id: Option<i64>,
    difficulty: Option<Difficulty>,
) {
    if let Some(category_id) = category_id {
        query.push(" AND q.category_id = ").push_bind(category_id);
    }
    if let Some(difficulty) = difficulty {
        query.push(" AND q.difficulty = ").push_bind(difficulty.as_str());
    }
}
