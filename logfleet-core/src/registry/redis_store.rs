use std::fmt;

use async_trait::async_trait;
use logfleet_model::WorkerRegistration;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::info;

use super::{RegistryStore, UpsertOutcome};
use crate::error::{FleetError, Result};

/// Key holding the JSON-encoded registry list.
pub const REGISTRY_KEY: &str = "registered_services";

/// Redis scripts for atomic registry mutation
mod scripts {
    use redis::Script;

    /// Loose-match upsert. Returns 0 on insert, else the 1-based slot that
    /// was replaced.
    pub fn upsert() -> Script {
        Script::new(
            r#"
            local entries = {}
            local raw = redis.call('GET', KEYS[1])
            if raw then
                local ok, decoded = pcall(cjson.decode, raw)
                if ok and type(decoded) == 'table' then
                    entries = decoded
                end
            end

            local incoming = cjson.decode(ARGV[1])
            local kept = {}
            local slot = nil
            for _, entry in ipairs(entries) do
                if entry.name == incoming.name or entry.url == incoming.url then
                    if slot == nil then
                        table.insert(kept, incoming)
                        slot = #kept
                    end
                else
                    table.insert(kept, entry)
                end
            end
            if slot == nil then
                table.insert(kept, incoming)
            end

            redis.call('SET', KEYS[1], cjson.encode(kept))
            if slot == nil then
                return 0
            end
            return slot
            "#,
        )
    }

    /// Remove the first entry matching ARGV[1] by name or url. Returns the
    /// removed entry as JSON, or nil.
    pub fn remove() -> Script {
        Script::new(
            r#"
            local raw = redis.call('GET', KEYS[1])
            if not raw then
                return false
            end
            local ok, entries = pcall(cjson.decode, raw)
            if not ok or type(entries) ~= 'table' then
                return false
            end

            local identifier = ARGV[1]
            local kept = {}
            local removed = nil
            for _, entry in ipairs(entries) do
                if removed == nil and (entry.name == identifier or entry.url == identifier) then
                    removed = entry
                else
                    table.insert(kept, entry)
                end
            end
            if removed == nil then
                return false
            end

            if #kept == 0 then
                redis.call('SET', KEYS[1], '[]')
            else
                redis.call('SET', KEYS[1], cjson.encode(kept))
            end
            return cjson.encode(removed)
            "#,
        )
    }
}

/// Registry shared by every control-plane instance pointed at the same
/// Redis. Mutations run as server-side scripts so the read-modify-write of
/// the list is a single atomic step.
#[derive(Clone)]
pub struct RedisRegistryStore {
    conn: ConnectionManager,
    key: String,
}

impl fmt::Debug for RedisRegistryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisRegistryStore")
            .field("connection", &"ConnectionManager")
            .field("key", &self.key)
            .finish()
    }
}

impl RedisRegistryStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting registry store to Redis at {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn, REGISTRY_KEY))
    }

    pub fn with_connection(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl RegistryStore for RedisRegistryStore {
    async fn upsert(
        &self,
        registration: WorkerRegistration,
    ) -> Result<UpsertOutcome> {
        let payload = serde_json::to_string(&registration)?;
        let mut conn = self.conn.clone();
        let slot: i64 = scripts::upsert()
            .key(&self.key)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        Ok(match slot {
            0 => UpsertOutcome::Inserted,
            n => UpsertOutcome::Replaced(usize::try_from(n - 1).map_err(|_| {
                FleetError::StoreUnavailable(format!(
                    "registry script returned invalid slot {n}"
                ))
            })?),
        })
    }

    async fn remove(
        &self,
        identifier: &str,
    ) -> Result<Option<WorkerRegistration>> {
        let mut conn = self.conn.clone();
        let removed: Option<String> = scripts::remove()
            .key(&self.key)
            .arg(identifier)
            .invoke_async(&mut conn)
            .await?;

        removed
            .map(|json| serde_json::from_str(&json).map_err(FleetError::from))
            .transpose()
    }

    async fn try_list(&self) -> Result<Vec<WorkerRegistration>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&self.key).await?;
        decode_registry(raw.as_deref())
    }
}

/// `cjson` encodes an empty table as `{}`; treat that like an empty list.
fn decode_registry(raw: Option<&str>) -> Result<Vec<WorkerRegistration>> {
    match raw.map(str::trim) {
        None | Some("") | Some("{}") => Ok(Vec::new()),
        Some(json) => Ok(serde_json::from_str(json)?),
    }
}
