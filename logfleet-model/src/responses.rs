use serde::{Deserialize, Serialize};

use crate::LogEvent;

/// Current shape of [`LogPagesResponse`]. Bumped on any breaking change.
pub const LOG_PAGES_SCHEMA_VERSION: u32 = 1;

/// Paged log listing returned by workers and proxied by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPagesResponse {
    pub schema_version: u32,
    pub pages: Vec<Vec<LogEvent>>,
}

impl LogPagesResponse {
    pub fn new(pages: Vec<Vec<LogEvent>>) -> Self {
        Self {
            schema_version: LOG_PAGES_SCHEMA_VERSION,
            pages,
        }
    }

    pub fn is_current(&self) -> bool {
        self.schema_version == LOG_PAGES_SCHEMA_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextWorkerResponse {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
