pub mod auth;
pub mod error;
pub mod handlers;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use pkg_metrics::MetricsRegistry;
use pkg_state::resource::ResourceStore;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: ResourceStore,
    pub metrics: Arc<MetricsRegistry>,
    /// Bearer token required on API routes; `None` leaves them open.
    pub token: Option<String>,
}
