//! # logfleet server
//!
//! Both processes of a log-ingesting fleet:
//!
//! - **Control plane**: worker registry, round-robin dispatch, heartbeat
//!   eviction and the `/replicate` WebSocket hub.
//! - **Worker**: local log storage, replication through the hub and
//!   self-registration with the control plane.
//!
//! Redis is optional. Without it the registry, dispatch cursor and
//! replication fanout are scoped to a single control-plane process.

pub mod app;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::{ControlPlaneState, WorkerState};
