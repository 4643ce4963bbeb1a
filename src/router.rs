use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the dashboard router
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::healthcheck))
        // Dashboard
        .route("/api/status", get(handlers::dashboard::get_status))
        .route("/api/branches", get(handlers::dashboard::list_branches))
        .route(
            "/api/datacenters",
            get(handlers::dashboard::list_datacenters).post(handlers::datacenters::create_datacenter),
        )
        .route("/api/colocation-centers", get(handlers::dashboard::list_colocation_centers))
        .route("/api/proposed-changes", get(handlers::dashboard::list_proposed_changes))
        // Create DC form
        .route("/api/locations", get(handlers::datacenters::list_locations))
        .route("/api/providers", get(handlers::datacenters::list_providers))
        .route("/api/designs", get(handlers::datacenters::list_designs))
        .route("/api/prefixes", get(handlers::datacenters::list_prefixes))
        // Create VPN form
        .route("/api/deployments", get(handlers::segments::list_deployments))
        .route("/api/deployments/:id/segments", get(handlers::segments::list_deployment_segments))
        .route("/api/organizations", get(handlers::segments::list_organizations))
        .route("/api/segments", post(handlers::segments::create_segment))
        // Rack visualization
        .route("/api/racks/rows", get(handlers::racks::list_rows))
        .route("/api/racks/rows/:id/racks", get(handlers::racks::list_row_racks))
        .route("/api/racks/:id/devices", get(handlers::racks::list_rack_devices))
        .route("/api/racks/:id/html", get(handlers::racks::rack_html))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
