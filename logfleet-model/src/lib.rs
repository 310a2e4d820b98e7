//! Core data model definitions shared across logfleet crates.
//!
//! Everything in here crosses a process boundary at some point: worker
//! registrations travel to the control plane, log events travel between
//! workers, and the response envelopes travel back to HTTP callers.
#![allow(missing_docs)]

pub mod log_event;
pub mod registration;
pub mod replication;
pub mod responses;
pub mod routes;

pub use log_event::LogEvent;
pub use registration::{RegistrationStatus, UnregisterRequest, WorkerRegistration};
pub use replication::{OriginId, ReplicationEnvelope, ReplicationMessage};
pub use responses::{
    Ack, LOG_PAGES_SCHEMA_VERSION, LogPagesResponse, NextWorkerResponse,
};
