//! Configuration management
//!
//! A single [`ConfigStore`] merges environment, file and literal sources.
//! Plugins read it through scoped [`ConfigProvider`] handles so the store can
//! report which keys each of them touched.

pub mod emitter;
pub mod provider;
pub mod source;
pub mod store;

pub use emitter::RequiredEmitter;
pub use provider::ConfigProvider;
pub use source::ConfigSource;
pub use store::{ConfigEvent, ConfigStore};
