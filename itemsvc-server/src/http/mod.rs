//! HTTP server layer
//!
//! Axum server with:
//! - Configurable CORS (permissive by default)
//! - Request tracing
//! - Pool initialize/shutdown around the serve loop
//! - JSON error responses

pub mod cors;
pub mod error;
pub mod routes;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use cors::{parse_methods, AllowedHeaders, AllowedOrigins, CorsConfig, CorsError};
pub use error::ApiError;
pub use server::{build_router, run_server, ServerConfig, ServerError};
