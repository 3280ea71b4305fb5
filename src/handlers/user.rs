use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Deserialize;

use crate::{
    extractors::{ApiJson, UserGuard},
    rejections::{AppError, OptionExt, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/user/profile", get(get_profile).put(update_profile))
}

async fn get_profile(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .find_user(claims.sub)
        .await
        .reject("could not get profile")?
        .or_not_found("user not found")?;

    Ok(views::ok(user))
}

/// Blank fields leave the stored value untouched.
#[derive(Deserialize)]
struct ProfileUpdate {
    nickname: Option<String>,
    avatar: Option<String>,
}

async fn update_profile(
    UserGuard(claims): UserGuard,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .update_profile(
            claims.sub,
            body.nickname.as_deref().map(str::trim),
            body.avatar.as_deref().map(str::trim),
        )
        .await
        .reject("could not update profile")?
        .or_not_found("user not found")?;

    tracing::info!(user_id = user.id, "profile updated");
    Ok(views::ok(user))
}
