//! HTTP server command
//!
//! Builds the pool and CORS policy from flags/environment, then runs the
//! server until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use itemsvc_server::db::{ConnectionPool, PgConnector, PoolConfig};
use itemsvc_server::http::{
    parse_methods, run_server, AllowedHeaders, AllowedOrigins, CorsConfig, CorsError, ServerConfig,
};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Allowed CORS origin(s), comma-separated; `*` allows any
    #[arg(long, env = "FRONT_ORIGIN", default_value = "*")]
    pub front_origin: String,

    /// Allowed CORS methods, comma-separated; `*` allows every standard method
    #[arg(long, env = "CORS_METHODS", default_value = "GET,POST,PUT,DELETE,OPTIONS")]
    pub cors_methods: String,

    /// Allowed CORS request headers, comma-separated; `*` allows any
    #[arg(long, env = "CORS_HEADERS", default_value = "*")]
    pub cors_headers: String,

    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "db")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true)]
    pub db_password: String,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "postgres")]
    pub db_name: String,

    /// Maximum pooled connections
    #[arg(long, env = "DB_POOL_MAX", default_value_t = 10)]
    pub db_pool_max: u32,

    /// Seconds a request waits for a free connection before failing
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 30)]
    pub db_acquire_timeout_secs: u64,
}

impl ServeArgs {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(
            &self.db_host,
            self.db_port,
            &self.db_name,
            &self.db_user,
            &self.db_password,
        )
        .with_max_connections(self.db_pool_max)
        .with_acquire_timeout(Duration::from_secs(self.db_acquire_timeout_secs))
    }

    pub fn server_config(&self) -> Result<ServerConfig, CorsError> {
        let cors = CorsConfig::default()
            .with_origins(AllowedOrigins::parse(&self.front_origin))
            .with_methods(parse_methods(&self.cors_methods)?)
            .with_headers(AllowedHeaders::parse(&self.cors_headers)?);

        Ok(ServerConfig {
            bind_addr: self.bind,
            cors,
        })
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let pool_config = args.pool_config();
    let server_config = args
        .server_config()
        .context("Invalid CORS configuration")?;
    tracing::info!(
        bind = %args.bind,
        database = %pool_config.redacted_url(),
        "Starting itemsvc server"
    );

    let pool = ConnectionPool::new(PgConnector::from_config(&pool_config), pool_config);

    // Run server (blocks until shutdown)
    run_server(pool, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
