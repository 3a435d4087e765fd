//! Messaging - command matching, invocation contexts and dispatch

pub mod command;
pub mod context;
pub mod dispatcher;
pub mod interaction;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod slash;

pub use command::{priority, Access, CallExtra, Command, CommandMeta};
pub use context::{CommandContext, TextContext};
pub use dispatcher::Commander;
pub use interaction::{content_from_options, InteractionContext};
pub use loader::{CommandEntry, CommandInit, LoadFilter};
pub use parser::{match_text, TextMatch};
pub use registry::{CommandRegistry, LoadedCommand};
pub use slash::{SlashCommand, SlashOption};
