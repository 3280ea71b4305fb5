use std::fmt::Display;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{quiz::answer_mask::AnswerError, views::Envelope};

/// Every way a request can fail, with the status it answers with.
#[derive(Debug)]
pub enum AppError {
    Input(&'static str),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Internal(&'static str),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AppError::Input(message)
            | AppError::Unauthorized(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::Internal(message) => message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Envelope::<()> {
            code: status.as_u16(),
            message: self.message().to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<AnswerError> for AppError {
    fn from(e: AnswerError) -> Self {
        AppError::Input(e.message())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("rejected JSON body: {rejection}");
        AppError::Input("invalid request body")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("rejected query string: {rejection}");
        AppError::Input("invalid query parameters")
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("rejected path parameter: {rejection}");
        AppError::Input("invalid path parameter")
    }
}

pub trait ResultExt<T> {
    /// Logs the error and answers 500 with `message`.
    fn reject(self, message: &'static str) -> Result<T, AppError>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn reject(self, message: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            AppError::Internal(message)
        })
    }
}

pub trait OptionExt<T> {
    /// Answers 404 with `message` when the value is absent.
    fn or_not_found(self, message: &'static str) -> Result<T, AppError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, AppError> {
        self.ok_or(AppError::NotFound(message))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn answer_errors_become_bad_requests() {
        let err = AppError::from(AnswerError::BadJudgeOptions);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), AnswerError::BadJudgeOptions.to_string());
    }

    #[test]
    fn helpers_pick_their_status() {
        let failed: Result<(), &str> = Err("disk full");
        let err = failed.reject("could not save").unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "could not save");

        let err = None::<()>.or_not_found("question not found").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
