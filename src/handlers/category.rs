use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Deserialize;

use crate::{
    db::models::{Category, CategoryFilter},
    extractors::{empty_as_none, ApiPath, ApiQuery, UserGuard},
    quiz::category_tree::{self, CategoryNode},
    rejections::{AppError, OptionExt, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{id}", get(get_category))
        .route("/categories/{id}/progress", get(category_progress))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    tree: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    parent_id: Option<i64>,
}

async fn list_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<axum::response::Response, AppError> {
    if query.tree == Some(true) {
        let rows = state
            .db
            .list_categories(&CategoryFilter::default())
            .await
            .reject("could not load category tree")?;
        return Ok(views::ok(assemble_tree(rows, false)).into_response());
    }

    let filter = CategoryFilter {
        parent_id: query.parent_id,
        ..Default::default()
    };
    let categories = state
        .db
        .list_categories(&filter)
        .await
        .reject("could not list categories")?;

    Ok(views::ok(categories).into_response())
}

/// Nests rows into a tree.
///
/// When the rows were filtered a child may arrive without its parent; such
/// subtrees are listed after the roots. Unfiltered, they point at damaged
/// data and are only logged.
pub(crate) fn assemble_tree(rows: Vec<Category>, filtered: bool) -> Vec<CategoryNode> {
    let forest = category_tree::build_tree(rows);
    if forest.orphans.is_empty() {
        return forest.roots;
    }
    if !filtered {
        let ids = forest.orphan_ids();
        tracing::warn!(?ids, "categories with a missing parent left out of the tree");
        return forest.roots;
    }

    let mut nodes = forest.roots;
    nodes.extend(forest.orphans);
    nodes
}

async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let category = state
        .db
        .find_category(id)
        .await
        .reject("could not get category")?
        .or_not_found("category not found")?;

    Ok(views::ok(category))
}

async fn category_progress(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let progress = state
        .db
        .category_progress(claims.sub, id)
        .await
        .reject("could not get category progress")?
        .or_not_found("category not found")?;

    Ok(views::ok(progress))
}
