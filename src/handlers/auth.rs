use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::User,
    extractors::{ApiJson, ClientInfo},
    names,
    rejections::{AppError, ResultExt},
    services::auth::{self, LoginOutcome, RefreshOutcome, UserSession, WechatLoginOutcome},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/guest", post(guest_login))
        .route("/auth/refresh", post(refresh))
}

/// Password login sends `type: "password"`; anything else with a `code` is
/// a WeChat mini-program login.
#[derive(Deserialize)]
struct LoginBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    username: Option<String>,
    password: Option<String>,
    code: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: User,
    expire_at: i64,
}

impl From<UserSession> for LoginResponse {
    fn from(session: UserSession) -> Self {
        Self {
            token: session.token.token,
            user: session.user,
            expire_at: session.token.expire_at.timestamp(),
        }
    }
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<impl IntoResponse, AppError> {
    let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

    if body.kind.as_deref() == Some("password") {
        let (Some(username), Some(password)) = (non_empty(&body.username), body.password.filter(|p| !p.is_empty()))
        else {
            return Err(AppError::Input("username and password are required"));
        };

        let outcome = state
            .auth
            .password_login(&username, &password)
            .await
            .reject("could not log in")?;
        return match outcome {
            LoginOutcome::Success(session) => Ok(views::ok(LoginResponse::from(session))),
            LoginOutcome::InvalidCredentials => Err(AppError::Unauthorized("invalid username or password")),
            LoginOutcome::AccountDisabled => Err(AppError::Forbidden("account is disabled")),
        };
    }

    let Some(code) = non_empty(&body.code) else {
        return Err(AppError::Input("login code is required"));
    };

    let outcome = state.auth.wechat_login(&code).await.reject("could not log in")?;
    match outcome {
        WechatLoginOutcome::Success(session) => Ok(views::ok(LoginResponse::from(session))),
        WechatLoginOutcome::NotConfigured => Err(AppError::Input("WeChat login is not configured")),
        WechatLoginOutcome::Rejected(reason) => {
            tracing::warn!("wechat login rejected: {reason}");
            Err(AppError::Input("WeChat login failed"))
        }
        WechatLoginOutcome::AccountDisabled => Err(AppError::Forbidden("account is disabled")),
    }
}

#[derive(Deserialize, Default)]
struct GuestBody {
    device_id: Option<String>,
}

async fn guest_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    client: ClientInfo,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // The body is optional; an empty or malformed one falls back to headers.
    let body: GuestBody = serde_json::from_slice(&body).unwrap_or_default();
    let header_id = headers
        .get(names::DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    let explicit = body.device_id.as_deref().filter(|id| !id.trim().is_empty()).or(header_id);
    let device_id = auth::guest_device_id(explicit, &client.ip, &client.user_agent);

    let outcome = state
        .auth
        .guest_login(&device_id)
        .await
        .reject("could not log in as guest")?;
    match outcome {
        LoginOutcome::Success(session) => Ok(views::ok(LoginResponse::from(session))),
        LoginOutcome::InvalidCredentials | LoginOutcome::AccountDisabled => {
            Err(AppError::Forbidden("guest account is disabled"))
        }
    }
}

#[derive(Deserialize)]
struct RefreshBody {
    token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    token: String,
    expire_at: i64,
}

async fn refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshBody>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .auth
        .refresh(&body.token)
        .await
        .reject("could not refresh token")?;

    match outcome {
        RefreshOutcome::Success(issued) => Ok(views::ok(RefreshResponse {
            token: issued.token,
            expire_at: issued.expire_at.timestamp(),
        })),
        RefreshOutcome::InvalidToken => Err(AppError::Unauthorized("invalid or expired token")),
        RefreshOutcome::UnknownAccount => Err(AppError::Unauthorized("account no longer exists")),
        RefreshOutcome::AccountDisabled => Err(AppError::Forbidden("account is disabled")),
    }
}
