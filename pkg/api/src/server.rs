use axum::{
    Router, middleware,
    routing::get,
};
use pkg_constants::api::ENVIRONMENTS_PATH;
use pkg_types::limit_range::LimitRange;
use pkg_types::quota::ResourceQuota;
use pkg_types::rbac::RoleBinding;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::AppState;
use crate::auth::auth_middleware;
use crate::handlers::{children, environments, system, watch};
use crate::request_id::request_id_middleware;

/// Build the operator API router.
pub fn router(state: AppState) -> Router {
    let environment_item = format!("{}/{{name}}", ENVIRONMENTS_PATH);

    // Protected API routes
    let api_routes = Router::new()
        .route(
            ENVIRONMENTS_PATH,
            get(environments::list_environments).post(environments::create_environment),
        )
        .route(
            &environment_item,
            get(environments::get_environment)
                .put(environments::replace_environment)
                .delete(environments::delete_environment),
        )
        .route("/api/v1/namespaces", get(children::list_namespaces))
        .route("/api/v1/namespaces/{ns}", get(children::get_namespace))
        .route(
            "/api/v1/namespaces/{ns}/resourcequotas",
            get(children::list_in_namespace::<ResourceQuota>),
        )
        .route(
            "/api/v1/namespaces/{ns}/limitranges",
            get(children::list_in_namespace::<LimitRange>),
        )
        .route(
            "/api/v1/namespaces/{ns}/rolebindings",
            get(children::list_in_namespace::<RoleBinding>),
        )
        .route("/api/v1/watch", get(watch::watch_events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Public routes + merged
    Router::new()
        .route("/healthz", get(system::healthz))
        .route("/metrics", get(system::metrics))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);
    info!("Starting API server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
