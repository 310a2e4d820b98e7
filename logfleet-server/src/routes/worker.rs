use axum::{
    Router,
    routing::get,
};
use tower_http::trace::TraceLayer;

use logfleet_model::routes::{HEALTH, PING, relative_to_v1, v1};

use crate::{
    handlers::{agent, health, logs},
    infra::app_state::WorkerState,
};

pub fn create_worker_v1_router() -> Router<WorkerState> {
    Router::new()
        .route(
            relative_to_v1(v1::logs::COLLECTION),
            get(logs::fetch_logs_handler).post(logs::submit_log_handler),
        )
        .route(
            relative_to_v1(v1::agent::STATUS),
            get(agent::registration_status_handler),
        )
}

pub fn create_worker_router(state: WorkerState) -> Router {
    Router::new()
        .nest(v1::ROOT, create_worker_v1_router())
        .route(HEALTH, get(health::worker_health_handler))
        .route(PING, get(health::ping_handler))
        .layer(TraceLayer::new_for_http())
        .layer(super::cors_layer())
        .with_state(state)
}
