use axum::{extract::State, response::Json};
use tracing::debug;

use logfleet_model::NextWorkerResponse;

use crate::infra::{app_state::ControlPlaneState, errors::AppResult};

/// Next worker in round-robin order, or 503 when none are registered.
pub async fn next_worker_handler(
    State(state): State<ControlPlaneState>,
) -> AppResult<Json<NextWorkerResponse>> {
    let url = state.dispatch.next().await?;
    debug!(worker = %url, "dispatched");
    Ok(Json(NextWorkerResponse { url }))
}
