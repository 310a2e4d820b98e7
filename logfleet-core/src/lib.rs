//! Core of the logfleet control plane and its workers.
//!
//! - [`registry`]: the ordered set of live workers
//! - [`dispatch`]: round-robin selection over the registry
//! - [`heartbeat`]: periodic probing and eviction
//! - [`logs`]: per-worker append-only log storage
//! - [`replication`]: propagation of log events between workers
//! - [`agent`]: worker self-registration
#![allow(missing_docs)]

pub mod agent;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod logs;
pub mod registry;
pub mod replication;

pub use error::{FleetError, Result};
