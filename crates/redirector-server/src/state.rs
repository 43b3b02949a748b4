//! Application state for the HTTP server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redirector_storage::Database;

/// Build metadata reported by the readiness probe.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub package_version: &'static str,
    pub commit_hash: String,
    pub build_time: DateTime<Utc>,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            package_version: env!("CARGO_PKG_VERSION"),
            commit_hash: String::new(),
            build_time: Utc::now(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Rule storage, also the resolver's rule store.
    pub db: Arc<Database>,
    /// Build metadata for `/__readiness`.
    pub build: Arc<BuildInfo>,
}

impl AppState {
    /// Creates a new application state with the given database.
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            build: Arc::new(BuildInfo::default()),
        }
    }

    /// Sets the build metadata.
    pub fn with_build_info(mut self, build: BuildInfo) -> Self {
        self.build = Arc::new(build);
        self
    }
}
