//! Process-wide configuration store

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use uuid::Uuid;

use super::emitter::RequiredEmitter;
use super::provider::ConfigProvider;
use super::source::ConfigSource;
use crate::application::errors::ConfigError;

/// Diagnostic raised while providers read configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// A provider read a key for the first time
    ProviderRead { provider: String, key: String },
    /// A provider the store never issued, or has sealed, attempted a read
    UnknownProvider { provider: String, key: String },
}

#[derive(Debug)]
struct ProviderRecord {
    label: String,
    keys: Vec<String>,
}

/// Merged configuration from every loaded source.
///
/// Only `load_source` mutates the values; reads go through a [`ConfigProvider`].
#[derive(Debug)]
pub struct ConfigStore {
    values: RwLock<Map<String, Value>>,
    providers: RwLock<HashMap<Uuid, ProviderRecord>>,
    events: RequiredEmitter<ConfigEvent>,
}

impl ConfigStore {
    pub fn new() -> Arc<Self> {
        let store = Self {
            values: RwLock::new(Map::new()),
            providers: RwLock::new(HashMap::new()),
            events: RequiredEmitter::new("config"),
        };
        store.events.on(|event| match event {
            ConfigEvent::ProviderRead { provider, key } => {
                tracing::debug!("[config] {} read {}", provider, key);
            }
            ConfigEvent::UnknownProvider { provider, key } => {
                tracing::warn!("[config] unknown provider {} tried to read {}", provider, key);
            }
        });
        Arc::new(store)
    }

    /// Build a store from sources, applied in order
    pub fn with_sources(sources: impl IntoIterator<Item = ConfigSource>) -> Result<Arc<Self>, ConfigError> {
        let store = Self::new();
        for source in sources {
            store.load_source(source)?;
        }
        Ok(store)
    }

    /// Merge a source's top-level keys over the current values
    pub fn load_source(&self, source: ConfigSource) -> Result<(), ConfigError> {
        let incoming = source.resolve()?;
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        tracing::debug!("[config] merging {} keys", incoming.len());
        values.extend(incoming);
        Ok(())
    }

    /// Register a new scoped read handle
    pub fn make_provider(self: &Arc<Self>, label: impl Into<String>) -> ConfigProvider {
        let id = Uuid::new_v4();
        let label = label.into();
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, ProviderRecord { label: label.clone(), keys: Vec::new() });
        ConfigProvider::new(id, label, Arc::clone(self))
    }

    /// Forcibly unregister a provider. Returns false if it was not registered.
    pub fn seal_provider(&self, provider: &ConfigProvider) -> bool {
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&provider.id())
            .is_some()
    }

    pub fn on_event(&self, listener: impl Fn(&ConfigEvent) + Send + Sync + 'static) {
        self.events.on(listener);
    }

    /// Labels of the registered providers with the keys each has read
    pub fn providers(&self) -> Vec<(String, Vec<String>)> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<_> = providers
            .values()
            .map(|r| (r.label.clone(), r.keys.clone()))
            .collect();
        list.sort();
        list
    }

    pub(crate) fn keys_read(&self, id: Uuid) -> Vec<String> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|r| r.keys.clone())
            .unwrap_or_default()
    }

    pub(crate) fn read(&self, id: Uuid, label: &str, key: &str) -> Option<Value> {
        let first_read = {
            let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
            match providers.get_mut(&id) {
                None => None,
                Some(record) if record.keys.iter().any(|k| k == key) => Some(false),
                Some(record) => {
                    record.keys.push(key.to_string());
                    Some(true)
                }
            }
        };

        match first_read {
            None => {
                self.events.emit(&ConfigEvent::UnknownProvider {
                    provider: label.to_string(),
                    key: key.to_string(),
                });
                return None;
            }
            Some(true) => self.events.emit(&ConfigEvent::ProviderRead {
                provider: label.to_string(),
                key: key.to_string(),
            }),
            Some(false) => {}
        }

        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_later_source_wins_shallowly() {
        let store = ConfigStore::with_sources([
            ConfigSource::raw(json!({"A": 1, "NESTED": {"x": 1, "y": 2}})),
            ConfigSource::raw(json!({"A": 2, "B": 3, "NESTED": {"x": 9}})),
        ])
        .unwrap();
        let provider = store.make_provider("test");

        assert_eq!(provider.get_option("A"), Some(json!(2)));
        assert_eq!(provider.get_option("B"), Some(json!(3)));
        assert_eq!(provider.get_option("NESTED"), Some(json!({"x": 9})));
    }

    #[test]
    fn test_sealed_provider_reads_nothing() {
        let store = ConfigStore::with_sources([ConfigSource::raw(json!({"SECRET": "s"}))]).unwrap();
        let provider = store.make_provider("plugin-Test");
        assert_eq!(provider.get_option("SECRET"), Some(json!("s")));

        assert!(store.seal_provider(&provider));
        assert!(!store.seal_provider(&provider));
        assert_eq!(provider.get_option("SECRET"), None);
        assert_eq!(provider.get_option_or("SECRET", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_events_fire_once_per_key() {
        let store = ConfigStore::with_sources([ConfigSource::raw(json!({"A": 1}))]).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.on_event(move |e| sink.lock().unwrap().push(e.clone()));

        let provider = store.make_provider("p");
        provider.get_option("A");
        provider.get_option("A");
        provider.get_option("MISSING");
        store.seal_provider(&provider);
        provider.get_option("A");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ConfigEvent::ProviderRead { provider: "p".into(), key: "A".into() },
                ConfigEvent::ProviderRead { provider: "p".into(), key: "MISSING".into() },
                ConfigEvent::UnknownProvider { provider: "p".into(), key: "A".into() },
            ]
        );
    }

    #[test]
    fn test_providers_listing_tracks_keys() {
        let store = ConfigStore::new();
        let a = store.make_provider("plugin-A");
        store.make_provider("plugin-B");
        a.get_option("X");
        a.get_option("Y");
        a.get_option("X");

        assert_eq!(
            store.providers(),
            vec![
                ("plugin-A".to_string(), vec!["X".to_string(), "Y".to_string()]),
                ("plugin-B".to_string(), vec![]),
            ]
        );
        assert_eq!(a.keys_read(), vec!["X".to_string(), "Y".to_string()]);
    }
}
