use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single log record. Immutable once created.
///
/// Clients may omit `sourceInstance` and `timestamp`; the worker that accepts
/// the event fills in the timestamp at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(default)]
    pub source_instance: String,
    pub name: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(source_instance: impl Into<String>, name: impl Into<String>) -> Self {
        Self::at(source_instance, name, Utc::now())
    }

    pub fn at(
        source_instance: impl Into<String>,
        name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source_instance: source_instance.into(),
            name: name.into(),
            timestamp,
        }
    }
}
