use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Envelope shared by every `/api` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::respond(StatusCode::OK, Some(data), None)
    }

    /// Success with `data: null`
    pub fn empty() -> Response {
        Self::respond(StatusCode::OK, None, None)
    }

    fn respond(status: StatusCode, data: Option<T>, error: Option<String>) -> Response {
        let body = Self {
            success: error.is_none(),
            data,
            error,
        };
        (status, Json(body)).into_response()
    }
}

impl ApiResponse<()> {
    pub fn error(status: StatusCode, message: impl Into<String>) -> Response {
        Self::respond(status, None, Some(message.into()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoppedResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletedResponse {
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeResponse {
    pub task_id: String,
    pub total_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub synced: bool,
    pub task_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
