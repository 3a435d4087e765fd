//! Application services - Business logic orchestration

pub mod bot;
pub mod prefix_service;
pub mod reaction_manager;

pub use bot::{listener_fn, Bot, Listener};
pub use prefix_service::PrefixService;
pub use reaction_manager::{ReactionHandler, ReactionManager};
