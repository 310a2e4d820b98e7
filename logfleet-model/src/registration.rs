use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker as advertised to the control plane.
///
/// Two registrations describe the same worker when either the name or the
/// url matches. This is a loose match, not a composite key: re-registering
/// under a new url but the same name replaces the old entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRegistration {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub ip_address: String,
}

impl WorkerRegistration {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ip_address: ip_address.into(),
        }
    }

    /// True if `identifier` is this worker's name or url.
    pub fn matches(&self, identifier: &str) -> bool {
        self.name == identifier || self.url == identifier
    }

    /// True if `other` would replace this entry on upsert.
    pub fn same_worker(&self, other: &WorkerRegistration) -> bool {
        self.name == other.name || self.url == other.url
    }
}

/// Body of an unregister call. `identifier` is a worker name or url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterRequest {
    pub identifier: String,
}

/// What a worker knows about its own registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatus {
    pub is_registered: bool,
    pub name: String,
    pub url: String,
    pub ip_address: String,
    pub control_plane_url: Option<String>,
    pub last_registration: Option<DateTime<Utc>>,
}
