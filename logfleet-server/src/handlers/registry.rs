use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;
use url::Url;

use logfleet_core::{FleetError, registry::UpsertOutcome};
use logfleet_model::{Ack, UnregisterRequest, WorkerRegistration};

use crate::infra::{
    app_state::ControlPlaneState,
    errors::{AppError, AppResult},
};

fn validate(registration: &WorkerRegistration) -> Result<(), FleetError> {
    if registration.name.trim().is_empty() {
        return Err(FleetError::InvalidInput(
            "registration name must not be empty".to_string(),
        ));
    }

    let url = Url::parse(&registration.url).map_err(|err| {
        FleetError::InvalidInput(format!("invalid worker url {:?}: {err}", registration.url))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(FleetError::InvalidInput(format!(
            "worker url {:?} must be an absolute http(s) url",
            registration.url
        )));
    }

    Ok(())
}

/// Register or re-register a worker.
pub async fn register_handler(
    State(state): State<ControlPlaneState>,
    Json(registration): Json<WorkerRegistration>,
) -> AppResult<Json<Ack>> {
    validate(&registration)?;

    let name = registration.name.clone();
    let url = registration.url.clone();
    match state.registry.upsert(registration).await? {
        UpsertOutcome::Inserted => info!(worker = %name, %url, "worker registered"),
        UpsertOutcome::Replaced(slot) => {
            info!(worker = %name, %url, slot, "worker re-registered")
        }
    }

    Ok(Json(Ack::ok()))
}

/// Remove a worker by name or url. Unknown identifiers are a no-op.
pub async fn unregister_handler(
    State(state): State<ControlPlaneState>,
    Json(request): Json<UnregisterRequest>,
) -> AppResult<Json<Ack>> {
    let identifier = request.identifier.trim();
    if identifier.is_empty() {
        return Err(FleetError::InvalidInput("identifier must not be empty".to_string()).into());
    }

    match state.registry.remove(identifier).await? {
        Some(removed) => {
            info!(worker = %removed.name, url = %removed.url, "worker unregistered")
        }
        None => info!(identifier, "unregister for unknown worker ignored"),
    }

    Ok(Json(Ack::ok()))
}

pub async fn list_registry_handler(
    State(state): State<ControlPlaneState>,
) -> AppResult<Json<Vec<WorkerRegistration>>> {
    Ok(Json(state.registry.try_list().await?))
}

pub async fn lookup_registration_handler(
    State(state): State<ControlPlaneState>,
    Path(identifier): Path<String>,
) -> AppResult<Json<WorkerRegistration>> {
    state
        .registry
        .try_list()
        .await?
        .into_iter()
        .find(|entry| entry.matches(&identifier))
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no worker registered as {identifier:?}")))
}
