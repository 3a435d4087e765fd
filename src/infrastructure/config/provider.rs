//! Scoped, tracked read handle into the config store

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::store::ConfigStore;
use crate::application::errors::ConfigError;

/// Read handle issued by [`ConfigStore::make_provider`].
///
/// Every read is recorded against the provider. Once the store seals the
/// provider, reads resolve to nothing.
#[derive(Clone)]
pub struct ConfigProvider {
    id: Uuid,
    label: String,
    store: Arc<ConfigStore>,
}

impl ConfigProvider {
    pub(crate) fn new(id: Uuid, label: String, store: Arc<ConfigStore>) -> Self {
        Self { id, label, store }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Keys this provider has read, in first-read order
    pub fn keys_read(&self) -> Vec<String> {
        self.store.keys_read(self.id)
    }

    pub fn get_option(&self, key: &str) -> Option<Value> {
        self.store.read(self.id, &self.label, key)
    }

    pub fn get_option_or(&self, key: &str, default: Value) -> Value {
        self.get_option(key).unwrap_or(default)
    }

    /// Read a key and check it against `T`. A missing key is checked as `null`,
    /// so only `Option<_>` targets accept it.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.get_option(key).unwrap_or(Value::Null);
        check::<T>(key, value)
    }

    /// Like [`get_typed`](Self::get_typed), but a missing key yields `default`
    pub fn get_typed_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get_option(key) {
            Some(value) => check::<T>(key, value),
            None => Ok(default),
        }
    }
}

fn check<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|e| ConfigError::Schema {
        key: key.to_string(),
        expected: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}

impl fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}
