pub mod db;
pub mod extractors;
pub mod handlers;
pub mod names;
pub mod quiz;
pub mod rejections;
pub mod services;
pub mod views;
pub mod wechat;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use services::{auth::AuthService, token::TokenService};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub auth: AuthService,
    pub tokens: TokenService,
    pub cors: Arc<CorsPolicy>,
}

impl AppState {
    pub fn new(db: db::Db, tokens: TokenService, wechat: Option<wechat::WechatApi>, cors: CorsPolicy) -> Self {
        Self {
            auth: AuthService::new(db.clone(), wechat, tokens.clone()),
            db,
            tokens,
            cors: Arc::new(cors),
        }
    }
}

/// Origins allowed to call the API from a browser.
#[derive(Debug, Clone, Default)]
pub enum CorsPolicy {
    Any,
    /// Listed origins plus any localhost origin.
    #[default]
    LocalhostOnly,
    List(Vec<String>),
}

impl CorsPolicy {
    /// Parses `*` or a comma-separated origin list.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => CorsPolicy::LocalhostOnly,
            Some("*") => CorsPolicy::Any,
            Some(list) => CorsPolicy::List(
                list.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            ),
        }
    }

    /// Value for `Access-Control-Allow-Origin`, if the origin may call us.
    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if let CorsPolicy::Any = self {
            return Some("*".to_string());
        }
        let origin = origin?;
        let listed = matches!(self, CorsPolicy::List(list) if list.iter().any(|o| o == origin));
        (listed || is_local_origin(origin)).then(|| origin.to_string())
    }
}

/// True when the origin's host is exactly `localhost` or `127.0.0.1`.
fn is_local_origin(origin: &str) -> bool {
    let Some((_, rest)) = origin.split_once("://") else {
        return false;
    };
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    host == "localhost" || host == "127.0.0.1"
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::auth::routes())
        .merge(handlers::category::routes())
        .merge(handlers::question::routes())
        .merge(handlers::user::routes())
        .merge(handlers::answer::routes())
        .merge(handlers::mistake::routes())
        .merge(handlers::statistics::routes())
        .nest("/admin", handlers::admin::routes());

    Router::new()
        .nest(names::API_PREFIX, api)
        .route(names::HEALTH_URL, get(health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "message": "service is running" }))
}

async fn not_found() -> rejections::AppError {
    rejections::AppError::NotFound("route not found")
}

async fn cors(State(state): State<AppState>, req: Request<axum::body::Body>, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    if let Some(allowed) = state.cors.allow_origin(origin.as_deref()) {
        if let Ok(value) = HeaderValue::from_str(&allowed) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Origin, Content-Type, Accept, Authorization, X-Device-ID"),
    );
    // Credentials are not allowed with a wildcard origin.
    if !matches!(*state.cors, CorsPolicy::Any) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_parses_wildcard_and_lists() {
        assert!(matches!(CorsPolicy::parse(Some("*")), CorsPolicy::Any));
        assert!(matches!(CorsPolicy::parse(None), CorsPolicy::LocalhostOnly));
        let CorsPolicy::List(list) = CorsPolicy::parse(Some("https://a.com, https://b.com/")) else {
            panic!("expected list");
        };
        assert_eq!(list, vec!["https://a.com", "https://b.com"]);
    }

    #[test]
    fn cors_allows_listed_and_local_origins() {
        let policy = CorsPolicy::parse(Some("https://a.com"));
        assert_eq!(policy.allow_origin(Some("https://a.com")).as_deref(), Some("https://a.com"));
        assert_eq!(
            policy.allow_origin(Some("http://localhost:5173")).as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(policy.allow_origin(Some("https://evil.com")), None);
        assert_eq!(policy.allow_origin(Some("https://localhost.attacker.example")), None);
        assert_eq!(policy.allow_origin(Some("https://127.0.0.1.attacker.example")), None);
        assert_eq!(policy.allow_origin(Some("https://evil.com/localhost")), None);
        assert_eq!(
            policy.allow_origin(Some("http://127.0.0.1:3000")).as_deref(),
            Some("http://127.0.0.1:3000")
        );
        assert_eq!(policy.allow_origin(None), None);
        assert_eq!(CorsPolicy::Any.allow_origin(None).as_deref(), Some("*"));
    }
}
