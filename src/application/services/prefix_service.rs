//! Per-guild command prefix overrides

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::application::cache::Cache;
use crate::application::errors::StorageError;
use crate::domain::traits::{Params, Store};

/// Reads and writes guild prefix overrides, memoizing every lookup.
///
/// Writes are read-then-write without a concurrency check; two admins
/// changing the same guild's prefixes at once may race.
pub struct PrefixService {
    store: Arc<dyn Store>,
    cache: Cache<String, Option<Vec<String>>>,
}

impl PrefixService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: Cache::new(),
        }
    }

    /// The guild's override, or `None` when it uses the defaults
    pub async fn get(&self, guild_id: &str) -> Result<Option<Vec<String>>, StorageError> {
        if let Some(cached) = self.cache.peek(&guild_id.to_string()) {
            return Ok(cached);
        }

        let row = self
            .store
            .get(
                "SELECT prefixes FROM guild_prefixes WHERE guild_id = :guild",
                Params::named([(":guild", guild_id)]),
            )
            .await?;
        let prefixes = match row.as_ref().and_then(|r| r.get("prefixes")) {
            Some(Value::String(json)) => Some(
                serde_json::from_str::<Vec<String>>(json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?,
            ),
            _ => None,
        };

        Ok(self.cache.get(guild_id.to_string(), || prefixes))
    }

    pub async fn set(&self, guild_id: &str, prefixes: Vec<String>) -> Result<(), StorageError> {
        let json = serde_json::to_string(&prefixes).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store
            .run(
                "INSERT INTO guild_prefixes (guild_id, prefixes) VALUES (?1, ?2)
                 ON CONFLICT(guild_id) DO UPDATE SET prefixes = excluded.prefixes",
                Params::positional([guild_id.to_string(), json]),
            )
            .await?;
        debug!("Guild {} prefixes set to {:?}", guild_id, prefixes);
        self.cache.insert(guild_id.to_string(), Some(prefixes));
        Ok(())
    }

    /// Drop the guild's override so it falls back to the defaults
    pub async fn reset(&self, guild_id: &str) -> Result<bool, StorageError> {
        let changed = self
            .store
            .run(
                "DELETE FROM guild_prefixes WHERE guild_id = ?1",
                Params::positional([guild_id]),
            )
            .await?;
        self.cache.insert(guild_id.to_string(), None);
        Ok(changed > 0)
    }
}
