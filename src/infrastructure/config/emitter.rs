//! Pub/sub for configuration diagnostics

use std::fmt::Debug;
use std::sync::RwLock;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Emitter that expects at least one listener for every event.
///
/// An emit with no listeners trips a debug assertion; release builds log it
/// and carry on.
pub struct RequiredEmitter<E> {
    name: &'static str,
    listeners: RwLock<Vec<Listener<E>>>,
}

impl<E: Debug> RequiredEmitter<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn on(&self, listener: impl Fn(&E) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    pub fn emit(&self, event: &E) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        debug_assert!(
            !listeners.is_empty(),
            "{} emitted {:?} with no listeners",
            self.name,
            event
        );
        if listeners.is_empty() {
            tracing::warn!("{} dropped {:?}: no listeners", self.name, event);
            return;
        }
        for listener in listeners.iter() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<E> Debug for RequiredEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequiredEmitter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
