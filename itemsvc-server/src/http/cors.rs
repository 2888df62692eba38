//! Cross-origin policy
//!
//! Credentials are allowed, which rules out a literal `*` in the response
//! headers. A wildcard origin or header list is therefore served by echoing
//! the request's `Origin` / `Access-Control-Request-Headers` back.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Origins allowed to call the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parse `*` or a comma-separated list of origins. Empty means any.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = split_list(raw).map(String::from).collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }
}

/// Request headers allowed on cross-origin calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedHeaders {
    Any,
    List(Vec<String>),
}

impl AllowedHeaders {
    /// Parse `*` or a comma-separated list of header names. Empty means any.
    ///
    /// # Errors
    ///
    /// Returns [`CorsError::InvalidHeader`] for a name that is not a valid
    /// HTTP header name.
    pub fn parse(raw: &str) -> Result<Self, CorsError> {
        let names: Vec<&str> = split_list(raw).collect();
        if names.is_empty() || names.contains(&"*") {
            return Ok(Self::Any);
        }

        names
            .into_iter()
            .map(|name| {
                name.parse::<HeaderName>()
                    .map(|h| h.as_str().to_string())
                    .map_err(|_| CorsError::InvalidHeader(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::List)
    }
}

/// Parse `*` or a comma-separated list of HTTP methods, case-insensitive.
///
/// `*` and the empty string expand to every standard method a browser may
/// send cross-origin.
///
/// # Errors
///
/// Returns [`CorsError::InvalidMethod`] for a token that is not a method name.
pub fn parse_methods(raw: &str) -> Result<Vec<Method>, CorsError> {
    let names: Vec<&str> = split_list(raw).collect();
    if names.is_empty() || names.contains(&"*") {
        return Ok(vec![
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);
    }

    let mut methods = Vec::with_capacity(names.len());
    for name in names {
        let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
            .map_err(|_| CorsError::InvalidMethod(name.to_string()))?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum CorsError {
    #[error("invalid CORS origin {0:?}")]
    InvalidOrigin(String),

    #[error("invalid CORS header name {0:?}")]
    InvalidHeader(String),

    #[error("invalid CORS method {0:?}")]
    InvalidMethod(String),
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub origins: AllowedOrigins,
    pub methods: Vec<Method>,
    pub headers: AllowedHeaders,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: AllowedOrigins::Any,
            methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            headers: AllowedHeaders::Any,
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(mut self, origins: AllowedOrigins) -> Self {
        self.origins = origins;
        self
    }

    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_headers(mut self, headers: AllowedHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Build the tower-http layer.
    ///
    /// # Errors
    ///
    /// Returns an error if an origin or header name is not a valid header value.
    pub fn layer(&self) -> Result<CorsLayer, CorsError> {
        let origin = match &self.origins {
            AllowedOrigins::Any => {
                tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
                if self.allow_credentials {
                    AllowOrigin::mirror_request()
                } else {
                    AllowOrigin::any()
                }
            }
            AllowedOrigins::List(origins) => {
                let values = origins
                    .iter()
                    .map(|o| {
                        HeaderValue::from_str(o).map_err(|_| CorsError::InvalidOrigin(o.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                AllowOrigin::list(values)
            }
        };

        let headers = match &self.headers {
            AllowedHeaders::Any if self.allow_credentials => AllowHeaders::mirror_request(),
            AllowedHeaders::Any => AllowHeaders::any(),
            AllowedHeaders::List(names) => {
                let names = names
                    .iter()
                    .map(|h| {
                        h.parse::<HeaderName>()
                            .map_err(|_| CorsError::InvalidHeader(h.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                AllowHeaders::list(names)
            }
        };

        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::list(self.methods.iter().cloned()))
            .allow_headers(headers)
            .allow_credentials(self.allow_credentials))
    }
}
