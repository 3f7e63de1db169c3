//! Application state

use libris_auth::Authenticator;
use libris_core::LibraryService;
use libris_db::Database;
use std::sync::Arc;

/// Prometheus handle used to render `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub library: Arc<LibraryService>,
    pub auth: Authenticator,
    /// Largest accepted cover image in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: Database,
        library: Arc<LibraryService>,
        auth: Authenticator,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            db,
            library,
            auth,
            max_upload_bytes,
        }
    }
}
