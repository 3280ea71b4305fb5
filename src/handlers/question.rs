use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Deserialize;

use crate::{
    db::models::QuestionFilter,
    extractors::{empty_as_none, ApiPath, ApiQuery, Pagination},
    names,
    quiz::Difficulty,
    rejections::{AppError, OptionExt, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions))
        .route("/questions/random", get(random_questions))
        .route("/questions/category/{category_id}", get(questions_by_category))
        .route("/questions/{id}", get(get_question))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    difficulty: Option<Difficulty>,
    #[serde(default, deserialize_with = "empty_as_none")]
    keyword: Option<String>,
}

async fn list_questions(
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<QuestionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = QuestionFilter {
        category_id: query.category_id,
        difficulty: query.difficulty,
        keyword: query.keyword,
        ..Default::default()
    };
    let (questions, total) = state
        .db
        .list_questions(&filter, page)
        .await
        .reject("could not list questions")?;

    Ok(views::paged(questions, total, page.page, page.size))
}

pub(crate) async fn get_question(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = state
        .db
        .find_question(id)
        .await
        .reject("could not get question")?
        .or_not_found("question not found")?;

    Ok(views::ok(question))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RandomQuery {
    count: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    difficulty: Option<Difficulty>,
}

async fn random_questions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RandomQuery>,
) -> Result<impl IntoResponse, AppError> {
    let count = query
        .count
        .and_then(|c| c.trim().parse::<i64>().ok())
        .filter(|c| (1..=names::MAX_RANDOM_COUNT).contains(c))
        .unwrap_or(names::DEFAULT_RANDOM_COUNT);

    let questions = state
        .db
        .random_questions(count, query.category_id, query.difficulty)
        .await
        .reject("could not pick random questions")?;

    Ok(views::ok(questions))
}

async fn questions_by_category(
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiPath(category_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let filter = QuestionFilter {
        category_id: Some(category_id),
        ..Default::default()
    };
    let (questions, total) = state
        .db
        .list_questions(&filter, page)
        .await
        .reject("could not list questions")?;

    Ok(views::paged(questions, total, page.page, page.size))
}
