use axum::{extract::State, response::IntoResponse, routing::get, Router};

use crate::{
    quiz::stats::TimeWindows,
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/statistics/overview", get(overview))
}

/// Site-wide totals with today, this week and this month breakdowns.
pub(crate) async fn overview(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let overview = state
        .db
        .overview_stats(TimeWindows::now())
        .await
        .reject("could not get overview statistics")?;

    Ok(views::ok(overview))
}
