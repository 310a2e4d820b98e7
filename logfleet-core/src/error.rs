use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("No workers are registered")]
    EmptyRegistry,

    #[error("Probe of {url} failed: {reason}")]
    ProbeFailure { url: String, reason: String },

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Replication failure: {0}")]
    ReplicationFailure(String),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<redis::RedisError> for FleetError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
