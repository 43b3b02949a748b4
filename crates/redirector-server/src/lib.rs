//! Redirector Server - HTTP redirect service.
//!
//! Every request that is not a probe or an admin route is resolved against
//! the rules of its `Host` and answered with a 301/302, or a JSON 404.
//!
//! ## Endpoints
//!
//! - `GET /__healthz` - Liveness probe
//! - `GET /__readiness` - Readiness probe with build metadata
//! - `GET /{any}` - Redirect (unless disabled)
//!
//! With the admin API enabled, under `/{admin_prefix}/api`:
//!
//! - `GET/POST /domains`, `GET/DELETE /domains/{id}`
//! - `GET/POST /domains/{id}/rules`, `POST /domains/{id}/rules/validate`
//! - `GET/PUT/DELETE /rules/{id}`
//!
//! ## Example
//!
//! ```no_run
//! use redirector_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use redirector_storage::Database;

pub use error::{ApiError, Result};
pub use state::{AppState, BuildInfo};

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default path prefix of the admin API.
pub const DEFAULT_ADMIN_PREFIX: &str = "admin";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0).
    pub host: String,
    /// Port to bind to (default: 8080).
    pub port: u16,
    /// Database path (None = in-memory).
    pub db_path: Option<String>,
    /// Answer non-probe requests with redirects.
    pub redirects_enabled: bool,
    /// Mount the admin API.
    pub admin_enabled: bool,
    /// First path segment of the admin API.
    pub admin_prefix: String,
    /// Reported by `/__readiness`.
    pub commit_hash: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
            redirects_enabled: true,
            admin_enabled: false,
            admin_prefix: DEFAULT_ADMIN_PREFIX.to_string(),
            commit_hash: String::new(),
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the database path.
    pub fn with_db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Enables or disables redirects.
    pub fn with_redirects(mut self, enabled: bool) -> Self {
        self.redirects_enabled = enabled;
        self
    }

    /// Mounts the admin API under `/{prefix}/api`.
    pub fn with_admin(mut self, prefix: impl Into<String>) -> Self {
        self.admin_enabled = true;
        self.admin_prefix = prefix.into();
        self
    }

    /// Sets the commit hash reported by the readiness probe.
    pub fn with_commit_hash(mut self, commit_hash: impl Into<String>) -> Self {
        self.commit_hash = commit_hash.into();
        self
    }

    fn admin_path(&self) -> String {
        match self.admin_prefix.trim_matches('/') {
            "" => format!("/{}", DEFAULT_ADMIN_PREFIX),
            prefix => format!("/{}", prefix),
        }
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] redirector_storage::StorageError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The HTTP server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let db = if let Some(ref path) = config.db_path {
            Database::with_path(path)?
        } else {
            Database::in_memory()?
        };

        Self::with_database(config, db)
    }

    /// Creates a server with an existing database.
    pub fn with_database(
        config: ServerConfig,
        db: Database,
    ) -> std::result::Result<Self, ServerError> {
        let state = AppState::new(db).with_build_info(BuildInfo {
            commit_hash: config.commit_hash.clone(),
            ..BuildInfo::default()
        });
        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let router = build_router(&config, state);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until Ctrl+C.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Redirector server on {}", self.addr);

        // SO_REUSEADDR lets restarts bind while old sockets linger in TIME_WAIT
        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(1024)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Set non-blocking for tokio
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Redirector server stopped");
        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Builds the full router for a configuration.
pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
    let mut router = Router::new()
        .route("/__healthz", get(handlers::healthz))
        .route("/__readiness", get(handlers::readiness));

    if config.admin_enabled {
        info!("Admin API mounted at {}/api", config.admin_path());
        router = router.nest(&config.admin_path(), admin_router());
    }

    router = if config.redirects_enabled {
        router.fallback(handlers::redirect)
    } else {
        info!("Redirects disabled");
        router.fallback(handlers::not_found)
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/domains",
            get(handlers::list_domains).post(handlers::create_domain),
        )
        .route(
            "/api/domains/{id}",
            get(handlers::get_domain).delete(handlers::delete_domain),
        )
        .route(
            "/api/domains/{id}/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route(
            "/api/domains/{id}/rules/validate",
            post(handlers::validate_rule),
        )
        .route(
            "/api/rules/{id}",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .fallback(handlers::not_found)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
