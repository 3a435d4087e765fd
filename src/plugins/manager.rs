//! Plugin registry - one instance per plugin type

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::trait_def::Plugin;

struct PluginEntry {
    name: &'static str,
    plugin: Arc<dyn Plugin>,
    any: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct Inner {
    index: HashMap<TypeId, usize>,
    entries: Vec<PluginEntry>,
}

/// Registry mapping plugin types to their singleton instance, in registration order
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<Inner>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the instance registered for `P`
    pub fn get<P: Plugin>(&self) -> Option<Arc<P>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let entry = &inner.entries[*inner.index.get(&TypeId::of::<P>())?];
        Arc::clone(&entry.any).downcast::<P>().ok()
    }

    /// Register `plugin` for `P`. If another instance won the race, that one is returned.
    pub fn insert<P: Plugin>(&self, name: &'static str, plugin: Arc<P>) -> Arc<P> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&i) = inner.index.get(&TypeId::of::<P>()) {
            if let Ok(existing) = Arc::clone(&inner.entries[i].any).downcast::<P>() {
                return existing;
            }
        }
        let position = inner.entries.len();
        inner.index.insert(TypeId::of::<P>(), position);
        inner.entries.push(PluginEntry {
            name,
            plugin: Arc::clone(&plugin) as Arc<dyn Plugin>,
            any: Arc::clone(&plugin) as Arc<dyn Any + Send + Sync>,
        });
        plugin
    }

    /// Every registered plugin, in registration order
    pub fn all(&self) -> Vec<(&'static str, Arc<dyn Plugin>)> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .map(|e| (e.name, Arc::clone(&e.plugin)))
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.all().into_iter().map(|(name, _)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
