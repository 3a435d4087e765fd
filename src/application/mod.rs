//! Application layer - bot core and command handling
//!
//! This layer contains:
//! - Services: the bot core, per-guild prefixes, reaction menus
//! - Messaging: command matching, invocation contexts, the Commander
//! - Errors: error types shared by every layer

pub mod cache;
pub mod errors;
pub mod messaging;
pub mod services;
