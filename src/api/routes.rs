use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::responses::{
    ApiResponse, CompletedResponse, HealthResponse, StoppedResponse, SyncResponse, TimeResponse,
};
use crate::manager::TaskManager;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub manager: Arc<TaskManager>,
}

impl AppState {
    pub fn new(manager: Arc<TaskManager>) -> Self {
        Self { manager }
    }
}

/// Builds the router:
/// - `GET /api/tasks`, `GET /api/tasks/completed`
/// - `GET /api/task/{id}`, `GET /api/active`, `GET /api/time/{id}`
/// - `POST /api/start/{id}`, `POST /api/stop/{id}`, `POST /api/complete/{id}`
/// - `GET /api/sync`
/// - `GET /health`
///
/// Start, complete and sync need a Todoist token as `Authorization: Bearer`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/tasks", get(get_tasks))
        .route("/api/tasks/completed", get(get_completed_tasks))
        .route("/api/task/{id}", get(get_task))
        .route("/api/active", get(get_active))
        .route("/api/start/{id}", post(post_start))
        .route("/api/stop/{id}", post(post_stop))
        .route("/api/complete/{id}", post(post_complete))
        .route("/api/time/{id}", get(get_time))
        .route("/api/sync", get(get_sync))
        .route("/health", get(get_health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn unauthorized() -> Response {
    ApiResponse::error(StatusCode::UNAUTHORIZED, "Authorization token required")
}

fn server_error(message: &str) -> Response {
    ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

async fn get_tasks(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.manager.incomplete_tasks())
}

async fn get_completed_tasks(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.manager.completed_tasks())
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.task_summary(&id) {
        Some(summary) => ApiResponse::ok(summary),
        None => ApiResponse::error(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn get_active(State(state): State<AppState>) -> Response {
    match state.manager.active_task_summary() {
        Some(summary) => ApiResponse::ok(summary),
        None => ApiResponse::<()>::empty(),
    }
}

async fn post_start(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };

    if !state.manager.start_work(&id, &token).await {
        debug!(task_id = %id, "Start request rejected");
        return server_error("Failed to start task");
    }

    match state.manager.active_task_summary() {
        Some(summary) => ApiResponse::ok(summary),
        None => ApiResponse::<()>::empty(),
    }
}

async fn post_stop(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.manager.stop_work(&id) {
        ApiResponse::ok(StoppedResponse { stopped: true })
    } else {
        server_error("Failed to stop task")
    }
}

async fn post_complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };

    if state.manager.complete_task(&id, &token).await {
        ApiResponse::ok(CompletedResponse { completed: true })
    } else {
        server_error("Failed to complete task")
    }
}

async fn get_time(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let total_seconds = state.manager.total_time(&id);
    ApiResponse::ok(TimeResponse {
        task_id: id,
        total_seconds,
    })
}

async fn get_sync(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };

    if !state.manager.sync(&token).await {
        return server_error("Sync failed");
    }

    ApiResponse::ok(SyncResponse {
        synced: true,
        task_count: state.manager.incomplete_tasks().len(),
    })
}

async fn get_health() -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
    })
}
