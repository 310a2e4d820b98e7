//! Append-only local log storage with time-ordered paging.

mod kv;

use std::{collections::BTreeMap, fmt, num::NonZeroUsize, sync::Arc};

use chrono::Utc;
use logfleet_model::LogEvent;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FleetError, Result};

pub use kv::{InMemoryKeyValueStore, KeyValueStore};

pub const LOG_KEY_PREFIX: &str = "log_";

pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(size) => size,
    None => unreachable!(),
};

const MAX_KEY_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct LogStore {
    kv: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for LogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("entries", &self.kv.len())
            .finish()
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryKeyValueStore::new()))
    }
}

fn generate_key() -> String {
    format!(
        "{LOG_KEY_PREFIX}{}_{}",
        Uuid::new_v4(),
        Utc::now().format("%Y%m%d%H%M%S%3f")
    )
}

impl LogStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store `event` under a fresh key and return the key. Existing keys are
    /// never overwritten.
    pub fn append(&self, event: &LogEvent) -> Result<String> {
        let payload = serde_json::to_string(event)?;
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = generate_key();
            if self.kv.insert_if_absent(key.clone(), payload.clone()) {
                return Ok(key);
            }
            debug!(%key, "log key collision; regenerating");
        }
        Err(FleetError::StoreUnavailable(
            "could not allocate a unique log key".to_string(),
        ))
    }

    /// Same storage effect as [`LogStore::append`]. Used for events that
    /// arrived through replication.
    pub fn append_without_replication(&self, event: &LogEvent) -> Result<String> {
        self.append(event)
    }

    pub fn get(&self, key: &str) -> Option<LogEvent> {
        self.kv
            .get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Every readable log entry keyed by storage key. Entries that are not
    /// log records, or do not parse, are left out.
    pub fn all_entries(&self) -> BTreeMap<String, LogEvent> {
        self.kv
            .snapshot()
            .into_iter()
            .filter(|(key, _)| key.starts_with(LOG_KEY_PREFIX))
            .filter_map(|(key, raw)| match serde_json::from_str::<LogEvent>(&raw) {
                Ok(event) => Some((key, event)),
                Err(err) => {
                    debug!(%key, error = %err, "skipping unreadable log entry");
                    None
                }
            })
            .collect()
    }

    /// Pages of at most `page_size` events, oldest first.
    ///
    /// The snapshot is taken now; each call recomputes from current data.
    pub fn page(&self, page_size: NonZeroUsize) -> LogPages {
        let mut entries: Vec<(String, LogEvent)> =
            self.all_entries().into_iter().collect();
        // Key order breaks timestamp ties so paging is deterministic.
        entries.sort_by(|(a_key, a), (b_key, b)| {
            a.timestamp.cmp(&b.timestamp).then_with(|| a_key.cmp(b_key))
        });

        LogPages {
            entries: entries
                .into_iter()
                .map(|(_, event)| event)
                .collect::<Vec<_>>()
                .into_iter(),
            page_size: page_size.get(),
        }
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }
}

/// Lazy sequence of fixed-size pages over a sorted snapshot.
#[derive(Debug)]
pub struct LogPages {
    entries: std::vec::IntoIter<LogEvent>,
    page_size: usize,
}

impl Iterator for LogPages {
    type Item = Vec<LogEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let page: Vec<LogEvent> =
            self.entries.by_ref().take(self.page_size).collect();
        (!page.is_empty()).then_some(page)
    }
}
