//! Local HTTP API for the browser front end.

mod responses;
mod routes;

pub use responses::{
    ApiResponse, CompletedResponse, HealthResponse, StoppedResponse, SyncResponse, TimeResponse,
};
pub use routes::{bearer_token, create_router, AppState};
