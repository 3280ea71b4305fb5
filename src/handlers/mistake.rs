use axum::{
    extract::State,
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{models::MistakeFilter, AddMistakeOutcome},
    extractors::{empty_as_none, ApiJson, ApiPath, ApiQuery, Pagination, UserGuard},
    quiz::Difficulty,
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mistakes", get(list_mistakes).post(add_mistake))
        .route("/mistakes/clear", delete(clear_mistakes))
        .route("/mistakes/statistics", get(mistake_statistics))
        .route("/mistakes/{id}", delete(remove_mistake))
        .route("/mistakes/{id}/master", put(mark_mastered))
        .route("/mistakes/{id}/reset", put(reset_mastered))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MistakeQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    difficulty: Option<Difficulty>,
    #[serde(default, deserialize_with = "empty_as_none")]
    is_mastered: Option<bool>,
}

async fn list_mistakes(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<MistakeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = MistakeFilter {
        category_id: query.category_id,
        difficulty: query.difficulty,
        is_mastered: query.is_mastered,
    };
    let (mistakes, total) = state
        .db
        .list_mistakes(claims.sub, &filter, page)
        .await
        .reject("could not list mistakes")?;

    Ok(views::paged(mistakes, total, page.page, page.size))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBody {
    question_id: i64,
}

async fn add_mistake(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddBody>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .db
        .add_mistake(claims.sub, body.question_id)
        .await
        .reject("could not add to mistake book")?;

    match outcome {
        AddMistakeOutcome::Added(entry) => Ok(views::ok(entry)),
        AddMistakeOutcome::AlreadyExists => Err(AppError::Conflict("question is already in the mistake book")),
        AddMistakeOutcome::QuestionNotFound => Err(AppError::NotFound("question not found")),
    }
}

async fn remove_mistake(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .db
        .remove_mistake(claims.sub, id)
        .await
        .reject("could not remove mistake")?;
    if !removed {
        return Err(AppError::NotFound("mistake book entry not found"));
    }

    Ok(views::done("removed"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    message: &'static str,
    deleted_count: u64,
}

async fn clear_mistakes(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let deleted_count = state
        .db
        .clear_mistakes(claims.sub)
        .await
        .reject("could not clear mistake book")?;

    Ok(views::ok(ClearResponse {
        message: "mistake book cleared",
        deleted_count,
    }))
}

async fn mark_mastered(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiPath(question_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_mastered(&state, claims.sub, question_id, true).await?;
    Ok(views::done("marked as mastered"))
}

async fn reset_mastered(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiPath(question_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_mastered(&state, claims.sub, question_id, false).await?;
    Ok(views::done("mastery reset"))
}

async fn set_mastered(state: &AppState, user_id: i64, question_id: i64, mastered: bool) -> Result<(), AppError> {
    let found = state
        .db
        .set_mistake_mastered(user_id, question_id, mastered)
        .await
        .reject("could not update mastery")?;
    if !found {
        return Err(AppError::NotFound("mistake book entry not found"));
    }
    Ok(())
}

async fn mistake_statistics(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state
        .db
        .mistake_stats(claims.sub)
        .await
        .reject("could not get mistake statistics")?;

    Ok(views::ok(stats))
}
