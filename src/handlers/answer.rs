use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::{
    db::{
        models::{AnswerHistoryFilter, StatisticsReport},
        SubmitOutcome,
    },
    extractors::{empty_as_none, ApiJson, ApiQuery, Pagination, UserGuard},
    quiz::stats::TimeWindows,
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/answers", post(submit_answer))
        .route("/answers/history", get(answer_history))
        .route("/answers/statistics", get(answer_statistics))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    question_id: i64,
    user_answer: i64,
    #[serde(default)]
    time_spent: i64,
}

async fn submit_answer(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitBody>,
) -> Result<impl IntoResponse, AppError> {
    if body.time_spent < 0 {
        return Err(AppError::Input("timeSpent must not be negative"));
    }

    let outcome = state
        .db
        .submit_answer(claims.sub, body.question_id, body.user_answer, body.time_spent)
        .await
        .reject("could not record answer")?;

    match outcome {
        SubmitOutcome::Graded(result) => Ok(views::ok(result)),
        SubmitOutcome::QuestionNotFound => Err(AppError::NotFound("question not found")),
        SubmitOutcome::InvalidAnswer(e) => Err(e.into()),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default, alias = "categoryId", deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, alias = "isCorrect", deserialize_with = "empty_as_none")]
    is_correct: Option<bool>,
}

async fn answer_history(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = AnswerHistoryFilter {
        category_id: query.category_id,
        is_correct: query.is_correct,
    };
    let (entries, total) = state
        .db
        .answer_history(claims.sub, &filter, page)
        .await
        .reject("could not get answer history")?;

    Ok(views::paged(entries, total, page.page, page.size))
}

async fn answer_statistics(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let overall = state
        .db
        .user_overall_stats(claims.sub, TimeWindows::now())
        .await
        .reject("could not get answer statistics")?;
    let categories = state
        .db
        .user_category_stats(claims.sub)
        .await
        .reject("could not get category statistics")?;

    Ok(views::ok(StatisticsReport { overall, categories }))
}
