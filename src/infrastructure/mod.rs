//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: layered configuration sources and scoped providers
//! - Database: the SQLite store
//! - Adapters: transports (console, in-memory)

pub mod adapters;
pub mod config;
pub mod database;
