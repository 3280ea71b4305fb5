// JSON response envelopes shared by every handler

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
pub struct PagedEnvelope<T> {
    pub code: u16,
    pub message: String,
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

/// `{code: 200, message: "success", data}`
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: 200,
        message: "success".to_string(),
        data: Some(data),
    })
}

/// Success envelope with a custom message and no data.
pub fn done(message: &str) -> Json<Envelope<()>> {
    Json(Envelope {
        code: 200,
        message: message.to_string(),
        data: None,
    })
}

pub fn paged<T: Serialize>(data: Vec<T>, total: i64, page: i64, size: i64) -> Json<PagedEnvelope<T>> {
    Json(PagedEnvelope {
        code: 200,
        message: "success".to_string(),
        data,
        total,
        page,
        size,
    })
}
