use axum::{extract::State, response::IntoResponse, routing::get, Router};

use super::record_by;
use crate::{
    db::{BasicSettings, QuizSettings, SettingsGroup},
    extractors::{AdminGuard, ApiJson, ClientInfo},
    names,
    rejections::{AppError, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settings/basic",
            get(show_settings::<BasicSettings>).put(save_settings::<BasicSettings>),
        )
        .route(
            "/settings/quiz",
            get(show_settings::<QuizSettings>).put(save_settings::<QuizSettings>),
        )
}

async fn show_settings<S>(AdminGuard(_): AdminGuard, State(state): State<AppState>) -> Result<impl IntoResponse, AppError>
where
    S: SettingsGroup + Send + Sync + 'static,
{
    let settings = state.db.settings::<S>().await.reject("could not load settings")?;
    Ok(views::ok(settings))
}

async fn save_settings<S>(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(settings): ApiJson<S>,
) -> Result<impl IntoResponse, AppError>
where
    S: SettingsGroup + Send + Sync + 'static,
{
    state
        .db
        .save_settings(&settings)
        .await
        .reject("could not save settings")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_UPDATE,
        names::RESOURCE_SETTINGS,
        format!("updated {} settings", S::KEY),
    )
    .await;
    Ok(views::ok(settings))
}
