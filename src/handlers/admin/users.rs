use axum::{
    extract::State,
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;

use super::record_by;
use crate::{
    db::models::{NewUser, Role, UserFilter, UserStatus, UserUpdate},
    extractors::{empty_as_none, AdminGuard, ApiJson, ApiPath, ApiQuery, ClientInfo, Pagination},
    names,
    rejections::{AppError, OptionExt, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/batch", delete(delete_users))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/users/{id}/status", put(update_status))
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    username: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    role: Option<Role>,
    #[serde(default, deserialize_with = "empty_as_none")]
    status: Option<UserStatus>,
}

async fn list_users(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = UserFilter {
        username: query.username,
        email: query.email,
        role: query.role,
        status: query.status,
    };
    let (users, total) = state
        .db
        .list_users(&filter, page)
        .await
        .reject("could not list users")?;

    Ok(views::paged(users, total, page.page, page.size))
}

async fn get_user(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .find_user(id)
        .await
        .reject("could not get user")?
        .or_not_found("user not found")?;

    Ok(views::ok(user))
}

async fn create_user(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(mut body): ApiJson<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    body.username = body.username.trim().to_string();
    body.email = body.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    if body.username.is_empty() || body.password.is_empty() {
        return Err(AppError::Input("username and password are required"));
    }

    let taken = state
        .db
        .user_identity_taken(Some(&body.username), body.email.as_deref(), None)
        .await
        .reject("could not check user identity")?;
    if taken {
        return Err(AppError::Conflict("username or email already exists"));
    }

    let user = state.db.create_user(&body).await.reject("could not create user")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_CREATE,
        names::RESOURCE_USER,
        format!("created user {}", body.username),
    )
    .await;
    Ok(views::ok(user))
}

async fn update_user(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UserUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let username = body.username.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let email = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    if username.is_some() || email.is_some() {
        let taken = state
            .db
            .user_identity_taken(username, email, Some(id))
            .await
            .reject("could not check user identity")?;
        if taken {
            return Err(AppError::Conflict("username or email already exists"));
        }
    }

    let user = state
        .db
        .update_user(id, &body)
        .await
        .reject("could not update user")?
        .or_not_found("user not found")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_UPDATE,
        names::RESOURCE_USER,
        format!("updated user {id}"),
    )
    .await;
    Ok(views::ok(user))
}

#[derive(Deserialize)]
struct StatusBody {
    status: UserStatus,
}

async fn update_status(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .set_user_status(id, body.status)
        .await
        .reject("could not update user status")?
        .or_not_found("user not found")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_UPDATE,
        names::RESOURCE_USER,
        format!("set user {id} status to {}", body.status.as_str()),
    )
    .await;
    Ok(views::ok(user))
}

async fn delete_user(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_user(id).await.reject("could not delete user")?;
    if !deleted {
        return Err(AppError::NotFound("user not found"));
    }

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_DELETE,
        names::RESOURCE_USER,
        format!("deleted user {id}"),
    )
    .await;
    Ok(views::done("deleted"))
}

#[derive(Deserialize)]
struct BatchBody {
    #[serde(default)]
    ids: Vec<i64>,
}

async fn delete_users(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(body): ApiJson<BatchBody>,
) -> Result<impl IntoResponse, AppError> {
    if body.ids.is_empty() {
        return Err(AppError::Input("no users selected"));
    }

    let deleted = state
        .db
        .delete_users(&body.ids)
        .await
        .reject("could not delete users")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_DELETE,
        names::RESOURCE_USER,
        format!("batch deleted {deleted} users: {:?}", body.ids),
    )
    .await;
    Ok(views::done("deleted"))
}
