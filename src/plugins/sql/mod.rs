//! SQL plugin - owns the bot's persistent store

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::errors::{BotError, PluginError, StorageError};
use crate::domain::traits::{Params, Store};
use crate::infrastructure::database::SqliteStore;
use crate::plugins::{Plugin, PluginContext, PluginFactory};

const DEFAULT_PATH: &str = "twink-bot.db";

/// Opens the database when constructed and creates the schema on load.
///
/// Other plugins take the store at construction time; its operations wait
/// until the schema exists.
pub struct SqlPlugin {
    store: Arc<SqliteStore>,
}

impl SqlPlugin {
    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = self
            .store
            .get("SELECT value FROM kv WHERE key = ?1", Params::positional([key]))
            .await?;
        Ok(row.and_then(|r| match r.get("value") {
            Some(Value::String(value)) => Some(value.clone()),
            _ => None,
        }))
    }

    pub async fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store
            .run(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                Params::positional([key, value]),
            )
            .await?;
        Ok(())
    }

    pub async fn kv_delete(&self, key: &str) -> Result<bool, StorageError> {
        let changed = self
            .store
            .run("DELETE FROM kv WHERE key = ?1", Params::positional([key]))
            .await?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl Plugin for SqlPlugin {
    async fn load(&self) -> Result<(), PluginError> {
        self.store.init().await.map_err(|e| PluginError::Load {
            name: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }
}

impl PluginFactory for SqlPlugin {
    const NAME: &'static str = "SqlPlugin";

    fn create(ctx: PluginContext) -> Result<Self, BotError> {
        let path: String = ctx.config.get_typed_or("SQL_PATH", DEFAULT_PATH.to_string())?;
        Ok(Self {
            store: Arc::new(SqliteStore::open(&path)?),
        })
    }
}
