use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use logfleet_model::routes::{HEALTH, PING, REPLICATE, relative_to_v1, v1};

use crate::{
    handlers::{dispatch, health, logs, registry, replicate},
    infra::app_state::ControlPlaneState,
};

/// Versioned API routes served by the control plane.
pub fn create_control_plane_v1_router() -> Router<ControlPlaneState> {
    Router::new()
        .route(
            relative_to_v1(v1::registry::COLLECTION),
            post(registry::register_handler).get(registry::list_registry_handler),
        )
        .route(
            relative_to_v1(v1::registry::ITEM),
            get(registry::lookup_registration_handler),
        )
        .route(
            relative_to_v1(v1::registry::UNREGISTER),
            post(registry::unregister_handler),
        )
        .route(
            relative_to_v1(v1::dispatch::NEXT),
            get(dispatch::next_worker_handler),
        )
        .route(
            relative_to_v1(v1::logs::COLLECTION),
            post(logs::ingest_log_handler).get(logs::proxy_logs_handler),
        )
}

pub fn create_control_plane_router(state: ControlPlaneState) -> Router {
    Router::new()
        .nest(v1::ROOT, create_control_plane_v1_router())
        .route(REPLICATE, get(replicate::replicate_handler))
        .route(HEALTH, get(health::control_plane_health_handler))
        .route(PING, get(health::ping_handler))
        .layer(TraceLayer::new_for_http())
        .layer(super::cors_layer())
        .with_state(state)
}
