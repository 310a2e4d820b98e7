use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use logfleet_core::FleetError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<FleetError> for AppError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::EmptyRegistry
            | FleetError::StoreUnavailable(_) => Self::unavailable(err.to_string()),
            FleetError::InvalidInput(_) | FleetError::Registration(_) => {
                Self::bad_request(err.to_string())
            }
            FleetError::Deserialization(_)
            | FleetError::Http(_)
            | FleetError::ProbeFailure { .. } => Self::bad_gateway(err.to_string()),
            FleetError::ReplicationFailure(_) => {
                tracing::error!(error = %err, "request failed");
                Self::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_is_service_unavailable() {
        let err = AppError::from(FleetError::EmptyRegistry);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn bad_input_is_client_error() {
        let err = AppError::from(FleetError::InvalidInput("name".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unreachable_store_is_service_unavailable() {
        let err = AppError::from(FleetError::StoreUnavailable("refused".into()));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
