use axum::{extract::State, response::Json};

use logfleet_model::RegistrationStatus;

use crate::infra::app_state::WorkerState;

pub async fn registration_status_handler(
    State(state): State<WorkerState>,
) -> Json<RegistrationStatus> {
    Json(state.agent.status())
}
