use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use serde::Deserialize;

use super::record_by;
use crate::{
    db::{
        models::{Category, CategoryFilter, CategoryUpdate, NewCategory},
        CategoryOutcome, DeleteCategoryOutcome,
    },
    extractors::{empty_as_none, AdminGuard, ApiJson, ApiPath, ApiQuery, ClientInfo, Pagination},
    handlers::category::assemble_tree,
    names,
    rejections::{AppError, OptionExt, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/categories/{id}/status", put(update_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    tree: Option<bool>,
    #[serde(default, alias = "keyword", deserialize_with = "empty_as_none")]
    search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    status: Option<i64>,
    #[serde(default, alias = "parent_id", deserialize_with = "empty_as_none")]
    parent_id: Option<i64>,
}

async fn list_categories(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Response, AppError> {
    let filter = CategoryFilter {
        keyword: query.search,
        status: query.status,
        parent_id: query.parent_id,
    };

    if query.tree == Some(true) {
        let filtered = filter.keyword.is_some() || filter.status.is_some() || filter.parent_id.is_some();
        let rows = state
            .db
            .list_categories(&filter)
            .await
            .reject("could not load category tree")?;
        return Ok(views::ok(assemble_tree(rows, filtered)).into_response());
    }

    let (categories, total) = state
        .db
        .list_categories_page(&filter, page)
        .await
        .reject("could not list categories")?;

    Ok(views::paged(categories, total, page.page, page.size).into_response())
}

fn saved(outcome: CategoryOutcome) -> Result<Category, AppError> {
    match outcome {
        CategoryOutcome::Saved(category) => Ok(category),
        CategoryOutcome::NotFound => Err(AppError::NotFound("category not found")),
        CategoryOutcome::ParentNotFound => Err(AppError::Input("parent category not found")),
        CategoryOutcome::ParentCycle => Err(AppError::Input("a category cannot be moved under itself")),
    }
}

async fn create_category(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(mut body): ApiJson<NewCategory>,
) -> Result<impl IntoResponse, AppError> {
    body.name = body.name.trim().to_string();
    if body.name.is_empty() {
        return Err(AppError::Input("category name is required"));
    }
    // 0 is what the admin form sends for "no parent"
    body.parent_id = body.parent_id.filter(|&id| id > 0);

    let outcome = state
        .db
        .create_category(&body)
        .await
        .reject("could not create category")?;
    let category = saved(outcome)?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_CREATE,
        names::RESOURCE_CATEGORY,
        format!("created category {}", category.name),
    )
    .await;
    Ok(views::ok(category))
}

async fn update_category(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
    ApiJson(mut body): ApiJson<CategoryUpdate>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::Input("category name is required"));
        }
        body.name = Some(name.trim().to_string());
    }
    if let Some(parent) = body.parent_id {
        body.parent_id = Some(parent.filter(|&p| p > 0));
    }

    let outcome = state
        .db
        .update_category(id, &body)
        .await
        .reject("could not update category")?;
    let category = saved(outcome)?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_UPDATE,
        names::RESOURCE_CATEGORY,
        format!("updated category {id}"),
    )
    .await;
    Ok(views::ok(category))
}

#[derive(Deserialize)]
struct StatusBody {
    status: i64,
}

async fn update_status(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<impl IntoResponse, AppError> {
    if !matches!(body.status, 0 | 1) {
        return Err(AppError::Input("status must be 0 or 1"));
    }

    let category = state
        .db
        .set_category_status(id, body.status)
        .await
        .reject("could not update category status")?
        .or_not_found("category not found")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_UPDATE,
        names::RESOURCE_CATEGORY,
        format!("set category {id} status to {}", body.status),
    )
    .await;
    Ok(views::ok(category))
}

async fn delete_category(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .db
        .delete_category(id)
        .await
        .reject("could not delete category")?;

    let category = match outcome {
        DeleteCategoryOutcome::Deleted(category) => category,
        DeleteCategoryOutcome::NotFound => return Err(AppError::NotFound("category not found")),
        DeleteCategoryOutcome::HasChildren => {
            return Err(AppError::Conflict("category still has subcategories"))
        }
        DeleteCategoryOutcome::HasQuestions => return Err(AppError::Conflict("category still has questions")),
    };

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_DELETE,
        names::RESOURCE_CATEGORY,
        format!("deleted category {}", category.name),
    )
    .await;
    Ok(views::done("deleted"))
}
