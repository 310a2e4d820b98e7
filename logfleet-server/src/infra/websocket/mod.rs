pub mod link;
pub mod messages;

pub use link::{LinkSettings, ReplicationLink, replication_endpoint};
pub use messages::*;
