use axum::{extract::State, response::IntoResponse, routing::get, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    extractors::{empty_as_none, AdminGuard, ApiQuery, Pagination},
    handlers::statistics::overview,
    names,
    quiz::{stats, Difficulty},
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/statistics", get(system_statistics))
        .route("/statistics/overview", get(admin_overview))
        .route("/statistics/questions", get(question_statistics))
        .route("/statistics/users", get(user_statistics))
}

async fn admin_overview(AdminGuard(_): AdminGuard, state: State<AppState>) -> Result<impl IntoResponse, AppError> {
    overview(state).await
}

/// Sort parameters. Unknown keys fall back to the default ordering.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SortQuery {
    #[serde(default, alias = "sort_by", deserialize_with = "empty_as_none")]
    sort_by: Option<String>,
    #[serde(default, alias = "sort_order", deserialize_with = "empty_as_none")]
    sort_order: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionStatsQuery {
    #[serde(default, alias = "category_id", deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    difficulty: Option<Difficulty>,
    #[serde(flatten)]
    sort: SortQuery,
}

async fn question_statistics(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<QuestionStatsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sort = stats::question_sort(query.sort.sort_by.as_deref(), query.sort.sort_order.as_deref());
    let (rows, total) = state
        .db
        .question_stats(query.category_id, query.difficulty, sort, page)
        .await
        .reject("could not get question statistics")?;

    Ok(views::paged(rows, total, page.page, page.size))
}

async fn user_statistics(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<SortQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sort = stats::user_sort(query.sort_by.as_deref(), query.sort_order.as_deref());
    let (rows, total) = state
        .db
        .user_stats(sort, page)
        .await
        .reject("could not get user statistics")?;

    Ok(views::paged(rows, total, page.page, page.size))
}

async fn system_statistics(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let active_since = (Utc::now() - Duration::days(names::ACTIVE_USER_DAYS)).naive_utc();
    let stats = state
        .db
        .system_stats(active_since)
        .await
        .reject("could not get system statistics")?;

    Ok(views::ok(stats))
}
