use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Deserialize;

use crate::{
    db::models::OperationLogFilter,
    extractors::{empty_as_none, resolve_page, AdminGuard, ApiQuery},
    names,
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/operation-logs", get(list_logs))
        .route("/logs", get(list_logs))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogQuery {
    page: Option<String>,
    #[serde(alias = "size", alias = "page_size")]
    page_size: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    operator: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    action: Option<String>,
    #[serde(default, alias = "start_time", deserialize_with = "empty_as_none")]
    start_time: Option<String>,
    #[serde(default, alias = "end_time", deserialize_with = "empty_as_none")]
    end_time: Option<String>,
}

async fn list_logs(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = resolve_page(
        query.page.as_deref(),
        query.page_size.as_deref(),
        names::DEFAULT_LOG_PAGE_SIZE,
    );
    let filter = OperationLogFilter {
        operator: query.operator,
        action: query.action,
        start_time: query.start_time,
        end_time: query.end_time,
    };

    let (logs, total) = state
        .db
        .list_operation_logs(&filter, page)
        .await
        .reject("could not list operation logs")?;

    Ok(views::paged(logs, total, page.page, page.size))
}
