//! API error type with IntoResponse
//!
//! Every failure a handler can hit maps to `500` with the raw error text
//! under `detail`. The error is logged before the response is built.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::PoolError;
use crate::metrics::MetricsError;

/// API error type with automatic HTTP status mapping
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Pool not running, exhausted, or a fresh connection failed to open
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The fixed query failed on a checked-out connection
    #[error(transparent)]
    Query(#[from] sqlx::Error),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Pool(e) => tracing::error!(error = %e, "Database pool error"),
            Self::Query(e) => tracing::error!(error = %e, "Query failed"),
            Self::Metrics(e) => tracing::error!(error = %e, "Metrics rendering failed"),
        }

        let body = json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn query_error_is_500_with_detail() {
        let err = ApiError::Query(sqlx::Error::Protocol("boom".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn pool_unavailable_is_500() {
        let response = ApiError::from(PoolError::Unavailable).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "database pool is not available");
    }
}
