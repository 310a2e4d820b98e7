//! Shared configuration library for logfleet.
//!
//! Values are layered: environment (including `.env`) over an optional
//! `logfleet.toml` over built-in defaults. CLI flags are applied on top by
//! the server binary.

pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use models::{
    Config, ConfigMetadata, HeartbeatSettings, RedisConfig,
    RegistrationSettings, ReplicationSettings, ServerConfig,
    StoreHealthSettings,
};
pub use validation::{ConfigWarning, ConfigWarnings};
