//! Built-in commands

pub mod help;
pub mod ping;
pub mod prefix;
pub mod restart;

use crate::application::messaging::CommandEntry;

/// Every compiled-in command, in load order
pub fn table() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("help", help::Help::create),
        CommandEntry::new("ping", ping::Ping::create),
        CommandEntry::new("prefix", prefix::Prefix::create),
        CommandEntry::new("restart", restart::Restart::create),
    ]
}
