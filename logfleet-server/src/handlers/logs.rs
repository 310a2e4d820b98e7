use std::num::NonZeroUsize;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use logfleet_core::{FleetError, logs::DEFAULT_PAGE_SIZE};
use logfleet_model::{LogEvent, LogPagesResponse, routes::v1};

use crate::infra::{
    app_state::{ControlPlaneState, WorkerState},
    errors::{AppError, AppResult},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page_size: Option<usize>,
}

impl PageQuery {
    fn resolve(&self) -> AppResult<NonZeroUsize> {
        match self.page_size {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(size) => NonZeroUsize::new(size).ok_or_else(|| {
                FleetError::InvalidInput("pageSize must be at least 1".to_string()).into()
            }),
        }
    }
}

fn require_name(event: &LogEvent) -> AppResult<()> {
    if event.name.trim().is_empty() {
        return Err(FleetError::InvalidInput(
            "log event name must not be empty".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Accept a log event on a worker: store it and replicate it to the fleet.
pub async fn submit_log_handler(
    State(state): State<WorkerState>,
    Json(mut event): Json<LogEvent>,
) -> AppResult<Json<Value>> {
    require_name(&event)?;
    if event.source_instance.trim().is_empty() {
        event.source_instance = state.agent.registration().name.clone();
    }

    let published = state.bus.replicate(event)?;
    debug!(key = %published.key, links = published.links, "log event accepted");

    Ok(Json(json!({
        "status": "ok",
        "key": published.key,
        "sequence": published.envelope.sequence,
        "replicated": published.links > 0
    })))
}

/// Every stored event on this worker, oldest first, in pages.
pub async fn fetch_logs_handler(
    State(state): State<WorkerState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<LogPagesResponse>> {
    let page_size = query.resolve()?;
    let pages = state.bus.store().page(page_size).collect();
    Ok(Json(LogPagesResponse::new(pages)))
}

/// Accept a log event on the control plane and broadcast it to every
/// connected worker. Nothing is stored here.
pub async fn ingest_log_handler(
    State(state): State<ControlPlaneState>,
    Json(event): Json<LogEvent>,
) -> AppResult<Json<Value>> {
    require_name(&event)?;

    let (envelope, delivered) = state.hub.ingest(event).await;
    info!(sequence = envelope.sequence, delivered, "log event broadcast");

    Ok(Json(json!({
        "status": "ok",
        "sequence": envelope.sequence,
        "delivered": delivered
    })))
}

/// Read logs through the next dispatched worker.
pub async fn proxy_logs_handler(
    State(state): State<ControlPlaneState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<LogPagesResponse>> {
    let page_size = query.resolve()?;
    let worker = state.dispatch.next().await?;
    let endpoint = format!(
        "{}{}?pageSize={page_size}",
        worker.trim_end_matches('/'),
        v1::logs::COLLECTION
    );

    let response = state
        .http
        .get(&endpoint)
        .send()
        .await
        .map_err(FleetError::from)?;

    let status = response.status();
    if !status.is_success() {
        warn!(%worker, %status, "worker rejected log read");
        return Err(AppError::bad_gateway(format!(
            "worker {worker} answered {status}"
        )));
    }

    let body = response.bytes().await.map_err(FleetError::from)?;
    let pages: LogPagesResponse =
        serde_json::from_slice(&body).map_err(FleetError::from)?;
    if !pages.is_current() {
        warn!(%worker, schema_version = pages.schema_version, "unsupported log page schema");
        return Err(AppError::bad_gateway(format!(
            "worker {worker} sent log pages with schema version {}",
            pages.schema_version
        )));
    }

    Ok(Json(pages))
}
