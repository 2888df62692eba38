//! Prometheus scrape endpoint
//!
//! Scrapes are not counted, so polling `/metrics` never moves a counter.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{routing::get, Router};

use crate::http::error::ApiError;
use crate::metrics::CONTENT_TYPE;
use crate::state::AppState;

pub const PATH: &str = "/metrics";

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.counter().render()?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}

/// Metrics routes
pub fn router() -> Router<AppState> {
    Router::new().route(PATH, get(metrics))
}
