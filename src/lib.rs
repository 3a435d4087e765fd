//! twink-bot - plugin and command core for a chat bot
//!
//! Layers:
//! - `domain`: platform-agnostic entities and collaborator traits
//! - `application`: the bot core, command matching and dispatch
//! - `infrastructure`: configuration, storage and transports
//! - `plugins`: the plugin system and core plugins
//! - `commands`: built-in commands

pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
