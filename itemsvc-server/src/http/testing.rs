//! Router test helpers

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use crate::db::fake::FakeConnector;
use crate::db::{ConnectionPool, PoolConfig};
use crate::metrics::RequestCounter;
use crate::state::AppState;

pub(crate) fn uninitialized_state(connector: FakeConnector) -> AppState {
    let pool = ConnectionPool::new(connector, PoolConfig::default().with_max_connections(4));
    AppState::new(pool, RequestCounter::new().expect("counter registration failed"))
}

pub(crate) async fn running_state(connector: FakeConnector) -> AppState {
    let state = uninitialized_state(connector);
    state.pool().initialize().await.expect("initialize failed");
    state
}

/// Send a GET through the router, returning status and body text.
pub(crate) async fn get_request(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}
