//! Loaded commands, ordered by descending priority

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::command::Command;

/// A command as loaded into the registry.
///
/// `aliases` is the effective alias list after conflict resolution and may be
/// shorter than the command's declared aliases.
#[derive(Clone)]
pub struct LoadedCommand {
    pub name: String,
    pub aliases: Vec<String>,
    pub command: Arc<dyn Command>,
}

impl LoadedCommand {
    pub fn priority(&self) -> i32 {
        self.command.meta().priority
    }

    /// Name the platform knows the command by
    pub fn slash_name(&self) -> String {
        self.command.meta().name().to_lowercase()
    }

    pub fn is_hidden(&self) -> bool {
        self.command.meta().hidden
    }
}

impl std::fmt::Debug for LoadedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedCommand")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("priority", &self.priority())
            .finish()
    }
}

/// Registry of loaded commands
#[derive(Default, Debug)]
pub struct CommandRegistry {
    commands: Vec<LoadedCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command under `name`. Aliases are lowercased; a command without
    /// aliases, or whose name is taken, is rejected.
    pub fn register(&mut self, name: impl Into<String>, command: Arc<dyn Command>) -> Result<(), String> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(format!("command {} is already loaded", name));
        }

        let declared = &command.meta().aliases;
        if declared.is_empty() || declared.iter().any(|a| a.trim().is_empty()) {
            return Err(format!("command {} declares an empty alias list or alias", name));
        }
        let aliases: Vec<String> = declared.iter().map(|a| a.to_lowercase()).collect();
        if aliases != *declared {
            warn!("Command {} declares aliases that are not lowercase: {:?}", name, declared);
        }

        self.commands.push(LoadedCommand { name, aliases, command });
        Ok(())
    }

    /// Order by descending priority, keeping load order within a tier
    pub fn sort(&mut self) {
        self.commands.sort_by_key(|c| std::cmp::Reverse(c.priority()));
    }

    /// Drop aliases that repeat one already claimed within the same tier.
    ///
    /// The command loaded first keeps the alias. Returns the number dropped.
    pub fn validate_aliases(&mut self) -> usize {
        let mut claimed: HashMap<(i32, String), String> = HashMap::new();
        let mut dropped = 0;

        for command in &mut self.commands {
            let tier = command.priority();
            let name = command.name.clone();
            command.aliases.retain(|alias| {
                match claimed.get(&(tier, alias.clone())) {
                    Some(owner) => {
                        warn!(
                            "Alias {} of command {} conflicts with command {} (priority {}); dropping it",
                            alias, name, owner, tier
                        );
                        dropped += 1;
                        false
                    }
                    None => {
                        claimed.insert((tier, alias.clone()), name.clone());
                        true
                    }
                }
            });
        }
        dropped
    }

    pub fn get(&self, name: &str) -> Option<&LoadedCommand> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// First command, in match order, that answers to `alias`
    pub fn find(&self, alias: &str) -> Option<&LoadedCommand> {
        let alias = alias.to_lowercase();
        self.commands.iter().find(|c| c.aliases.contains(&alias))
    }

    pub fn by_slash_name(&self, name: &str) -> Option<&LoadedCommand> {
        self.commands.iter().find(|c| c.slash_name() == name)
    }

    pub fn all(&self) -> &[LoadedCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
