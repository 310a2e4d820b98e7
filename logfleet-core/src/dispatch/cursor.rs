use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::{FleetError, Result};

/// Key holding the shared round-robin position.
pub const CURSOR_KEY: &str = "round_robin_counter";

#[async_trait]
pub trait CursorStore: Send + Sync + fmt::Debug {
    /// Atomically read the slot to serve for a registry of `modulus` entries
    /// and advance past it. The stored value is reduced modulo `modulus`
    /// first, so a cursor left over from a larger registry stays in range.
    async fn fetch_advance(&self, modulus: usize) -> Result<usize>;
}

/// Cursor local to this process.
#[derive(Debug, Default)]
pub struct InMemoryCursor {
    position: AtomicUsize,
}

impl InMemoryCursor {
    pub fn advance(&self, modulus: usize) -> usize {
        let modulus = modulus.max(1);
        let previous = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current % modulus + 1) % modulus)
            })
            .unwrap_or_else(|current| current);
        previous % modulus
    }
}

#[async_trait]
impl CursorStore for InMemoryCursor {
    async fn fetch_advance(&self, modulus: usize) -> Result<usize> {
        if modulus == 0 {
            return Err(FleetError::EmptyRegistry);
        }
        Ok(self.advance(modulus))
    }
}

mod scripts {
    use redis::Script;

    pub fn fetch_advance() -> Script {
        Script::new(
            r#"
            local modulus = tonumber(ARGV[1])
            local current = tonumber(redis.call('GET', KEYS[1]) or '0') or 0
            local slot = current % modulus
            redis.call('SET', KEYS[1], (slot + 1) % modulus)
            return slot
            "#,
        )
    }
}

/// Cursor shared through Redis by every control-plane instance.
#[derive(Clone)]
pub struct RedisCursorStore {
    conn: ConnectionManager,
    key: String,
}

impl fmt::Debug for RedisCursorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCursorStore")
            .field("connection", &"ConnectionManager")
            .field("key", &self.key)
            .finish()
    }
}

impl RedisCursorStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_key(conn, CURSOR_KEY)
    }

    pub fn with_key(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }
}

#[async_trait]
impl CursorStore for RedisCursorStore {
    async fn fetch_advance(&self, modulus: usize) -> Result<usize> {
        if modulus == 0 {
            return Err(FleetError::EmptyRegistry);
        }
        let mut conn = self.conn.clone();
        let slot: i64 = scripts::fetch_advance()
            .key(&self.key)
            .arg(modulus)
            .invoke_async(&mut conn)
            .await?;

        usize::try_from(slot).map_err(|_| {
            FleetError::StoreUnavailable(format!("cursor script returned {slot}"))
        })
    }
}
