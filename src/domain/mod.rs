//! Domain layer - Platform objects and collaborator abstractions
//! 
//! This layer contains:
//! - Entities: Users, messages, interactions, reactions and transport events
//! - Traits: Abstractions for the messaging transport and persistent store

pub mod entities;
pub mod traits;
