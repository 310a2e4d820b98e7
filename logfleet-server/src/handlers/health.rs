use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};
use tracing::debug;

use crate::infra::app_state::{ControlPlaneState, WorkerState};

pub async fn ping_handler() -> Json<Value> {
    debug!("Ping endpoint called");
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Control-plane liveness. Unhealthy when the registry store cannot be read.
pub async fn control_plane_health_handler(
    State(state): State<ControlPlaneState>,
) -> Result<Json<Value>, StatusCode> {
    let mut health_status = json!({
        "status": "healthy",
        "role": "control-plane",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    let mut is_unhealthy = false;

    match state.registry.try_count().await {
        Ok(workers) => {
            health_status["checks"]["registry"] = json!({
                "status": "healthy",
                "workers": workers
            });
        }
        Err(e) => {
            health_status["checks"]["registry"] = json!({
                "status": "unhealthy",
                "error": e.to_string()
            });
            is_unhealthy = true;
        }
    }

    health_status["checks"]["replication"] = json!({
        "subscribers": state.hub.subscriber_count(),
        "distributed": state.hub.is_distributed()
    });

    if is_unhealthy {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(Json(health_status))
    }
}

/// Worker liveness; the heartbeat probe target.
pub async fn worker_health_handler(State(state): State<WorkerState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "role": "worker",
        "name": state.agent.registration().name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "logs": state.bus.store().len()
    }))
}
