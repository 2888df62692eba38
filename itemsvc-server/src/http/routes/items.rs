//! Item listing endpoint

use axum::extract::State;
use axum::{routing::get, Json, Router};

use crate::db::{Item, ItemRepo};
use crate::http::error::ApiError;
use crate::state::AppState;

pub const PATH: &str = "/items";

/// GET /items - every row of the items table, in database order
async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    state.counter().increment(PATH);

    let mut conn = state.pool().acquire().await?;
    let listed = ItemRepo::new(&mut *conn).list().await;
    // A double release is logged by the pool and is not a client error
    let _ = state.pool().release(conn);

    Ok(Json(listed?))
}

/// Item routes
pub fn router() -> Router<AppState> {
    Router::new().route(PATH, get(list_items))
}
