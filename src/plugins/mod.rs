//! Plugin system
//!
//! Plugins are keyed by type: each plugin type has at most one instance per
//! bot, constructed on first registration and loaded once the transport is
//! ready.

pub mod manager;
pub mod restart;
pub mod sql;
pub mod trait_def;

pub use manager::PluginRegistry;
pub use restart::RestartPlugin;
pub use sql::SqlPlugin;
pub use trait_def::{BotHandle, Dependency, Plugin, PluginContext, PluginFactory};
