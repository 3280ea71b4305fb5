use axum::{extract::State, response::IntoResponse, routing::post, Router};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Admin, NewOperationLog},
    extractors::{ApiJson, ClientInfo},
    names,
    rejections::{AppError, ResultExt},
    services::{auth::AdminLoginOutcome, token::Claims},
    views, AppState,
};

mod categories;
mod logs;
mod questions;
mod settings;
mod statistics;
mod users;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .merge(users::routes())
        .merge(categories::routes())
        .merge(questions::routes())
        .merge(statistics::routes())
        .merge(logs::routes())
        .merge(settings::routes())
}

/// Appends an operation log entry. A failed write is logged, never surfaced.
async fn record(
    state: &AppState,
    operator: &str,
    client: &ClientInfo,
    action: &'static str,
    resource: &'static str,
    description: String,
) {
    let entry = NewOperationLog {
        operator: operator.to_string(),
        action,
        resource,
        description,
        ip: client.ip.clone(),
        user_agent: client.user_agent.clone(),
    };
    if let Err(e) = state.db.log_operation(entry).await {
        tracing::warn!("could not write operation log: {e}");
    }
}

async fn record_by(
    state: &AppState,
    claims: &Claims,
    client: &ClientInfo,
    action: &'static str,
    resource: &'static str,
    description: String,
) {
    record(state, &claims.name, client, action, resource, description).await;
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: Admin,
    expire_at: i64,
}

async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<impl IntoResponse, AppError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Input("username and password are required"));
    }

    let outcome = state
        .auth
        .admin_login(body.username.trim(), &body.password)
        .await
        .reject("could not log in")?;
    let AdminLoginOutcome::Success(session) = outcome else {
        return Err(AppError::Unauthorized("invalid username or password"));
    };

    record(
        &state,
        &session.admin.username,
        &client,
        names::ACTION_LOGIN,
        names::RESOURCE_ADMIN,
        format!("admin login: {}", session.admin.username),
    )
    .await;

    Ok(views::ok(LoginResponse {
        token: session.token.token,
        expire_at: session.token.expire_at.timestamp(),
        user: session.admin,
    }))
}
