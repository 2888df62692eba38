//! Health check endpoint
//!
//! Never touches the database pool, so it answers even when the database
//! is down.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub const PATH: &str = "/status";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
}

/// GET /status
async fn status(State(state): State<AppState>) -> Json<HealthResponse> {
    state.counter().increment(PATH);
    Json(HealthResponse { message: "OK" })
}

/// Health routes
pub fn router() -> Router<AppState> {
    Router::new().route(PATH, get(status))
}
