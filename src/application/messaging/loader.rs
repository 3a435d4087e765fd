//! Compiled-in command table and load filtering

use std::collections::HashSet;
use std::sync::Arc;

use super::command::Command;
use crate::application::errors::BotError;
use crate::infrastructure::config::ConfigProvider;
use crate::plugins::BotHandle;

/// What a command receives at construction
#[derive(Debug, Clone)]
pub struct CommandInit {
    pub bot: BotHandle,
    pub config: ConfigProvider,
}

/// One row of the command table
#[derive(Clone, Copy)]
pub struct CommandEntry {
    pub name: &'static str,
    pub create: fn(CommandInit) -> Result<Arc<dyn Command>, BotError>,
}

impl CommandEntry {
    pub const fn new(name: &'static str, create: fn(CommandInit) -> Result<Arc<dyn Command>, BotError>) -> Self {
        Self { name, create }
    }
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CommandEntry").field(&self.name).finish()
    }
}

/// Whitelist/blacklist over command table names
#[derive(Debug, Clone, Default)]
pub struct LoadFilter {
    whitelist: Option<HashSet<String>>,
    blacklist: HashSet<String>,
}

impl LoadFilter {
    pub fn new(whitelist: Option<Vec<String>>, blacklist: Vec<String>) -> Self {
        Self {
            whitelist: whitelist.map(|names| names.into_iter().collect()),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        let listed = self.whitelist.as_ref().map_or(true, |names| names.contains(name));
        listed && !self.blacklist.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist_then_blacklist() {
        let open = LoadFilter::default();
        assert!(open.allows("ping"));

        let filter = LoadFilter::new(
            Some(vec!["ping".to_string(), "help".to_string()]),
            vec!["help".to_string()],
        );
        assert!(filter.allows("ping"));
        assert!(!filter.allows("help"));
        assert!(!filter.allows("restart"));
    }
}
