//! Log replication between workers.
//!
//! Workers own a [`ReplicationBus`]; the control plane owns a
//! [`ReplicationHub`] that every worker connects to, plus an optional
//! [`Backplane`] shared with other control-plane instances.

mod backoff;
mod backplane;
mod bus;
mod hub;
mod subscriber;

pub use backoff::Backoff;
pub use backplane::{
    Backplane, BackplaneFrame, DEFAULT_CHANNEL, LocalBackplane, RedisBackplane,
    connect_backplane,
};
pub use bus::{Published, ReceiveOutcome, ReplicationBus};
pub use hub::ReplicationHub;
pub use subscriber::Subscriber;
