use std::{fmt::Display, net::SocketAddr, str::FromStr};

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query},
    http::{header, request::Parts},
};
use serde::{Deserialize, Deserializer};

use crate::{
    db::{models::Role, Page},
    names,
    rejections::AppError,
    services::token::Claims,
    AppState,
};

/// JSON body whose rejection is an enveloped 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is an enveloped 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters whose rejection is an enveloped 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

fn bearer_claims(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized("missing bearer token"))?;

    state.tokens.verify(token).map_err(|e| {
        tracing::debug!("bearer token rejected: {e}");
        AppError::Unauthorized("invalid or expired token")
    })
}

/// A signed-in learner, registered or guest.
pub struct UserGuard(pub Claims);

impl FromRequestParts<AppState> for UserGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        match claims.role {
            Role::User | Role::Guest => Ok(UserGuard(claims)),
            Role::Admin => Err(AppError::Forbidden("learner account required")),
        }
    }
}

/// A signed-in administrator.
pub struct AdminGuard(pub Claims);

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if claims.role != Role::Admin {
            return Err(AppError::Forbidden("admin access required"));
        }
        Ok(AdminGuard(claims))
    }
}

/// Client address and user agent, for operation logs and guest fingerprints.
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = header_str("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| header_str("x-real-ip").map(str::to_string))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();
        let user_agent = header_str(header::USER_AGENT.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(ClientInfo { ip, user_agent })
    }
}

#[derive(Deserialize)]
struct RawPage {
    page: Option<String>,
    size: Option<String>,
}

/// `page` and `size` from the query string, lenient about bad values.
pub struct Pagination(pub Page);

impl<S: Send + Sync> FromRequestParts<S> for Pagination {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = Query::<RawPage>::from_request_parts(parts, state)
            .await
            .map(|Query(raw)| raw)
            .unwrap_or(RawPage { page: None, size: None });

        Ok(Pagination(resolve_page(
            raw.page.as_deref(),
            raw.size.as_deref(),
            names::DEFAULT_PAGE_SIZE,
        )))
    }
}

/// Page 1 and `default_size` stand in for missing or invalid values.
pub fn resolve_page(page: Option<&str>, size: Option<&str>, default_size: i64) -> Page {
    let page = page
        .and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let size = size
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|s| (1..=names::MAX_PAGE_SIZE).contains(s))
        .unwrap_or(default_size);
    Page::new(page, size)
}

/// Deserializes `?key=` as `None` instead of failing to parse the empty string.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults() {
        assert_eq!(resolve_page(None, None, 10), Page::new(1, 10));
        assert_eq!(resolve_page(Some("3"), Some("20"), 10), Page::new(3, 20));
    }

    #[test]
    fn page_rejects_bad_values() {
        assert_eq!(resolve_page(Some("0"), Some("abc"), 10), Page::new(1, 10));
        assert_eq!(resolve_page(Some("-2"), Some("101"), 10), Page::new(1, 10));
        assert_eq!(resolve_page(Some("2"), Some("0"), 20), Page::new(2, 20));
        assert_eq!(resolve_page(None, Some("100"), 10), Page::new(1, 100));
    }
}
