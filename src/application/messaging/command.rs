//! Command trait and metadata

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::CommandContext;
use super::slash::SlashCommand;
use crate::application::errors::CommandError;
use crate::domain::entities::{CommandInteraction, Permission};

/// Priority tiers. Higher tiers are matched first and are more privileged.
pub mod priority {
    pub const OWNER: i32 = 4;
    pub const ADMIN: i32 = 3;
    pub const MODERATOR: i32 = 2;
    pub const DEFAULT: i32 = 0;

    /// Human-readable tier name
    pub fn label(priority: i32) -> &'static str {
        match priority {
            p if p >= OWNER => "Owner",
            p if p >= ADMIN => "Admin",
            p if p >= MODERATOR => "Moderator",
            _ => "General",
        }
    }
}

/// Static description of a command
#[derive(Debug, Clone)]
pub struct CommandMeta {
    /// First alias is the canonical name
    pub aliases: Vec<String>,
    pub priority: i32,
    pub short_description: String,
    pub long_description: Option<String>,
    pub usage: Option<String>,
    pub examples: Vec<String>,
    /// Hidden commands are left out of listings and slash registration
    pub hidden: bool,
}

impl CommandMeta {
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
            priority: priority::DEFAULT,
            short_description: String::new(),
            long_description: None,
            usage: None,
            examples: Vec::new(),
            hidden: false,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.short_description = desc.into();
        self
    }

    pub fn with_long_description(mut self, desc: impl Into<String>) -> Self {
        self.long_description = Some(desc.into());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Canonical display name
    pub fn name(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or_default()
    }
}

/// Extra data handed to [`Command::call`]
#[derive(Debug, Clone, Default)]
pub struct CallExtra {
    /// Prefix the invocation used; `/` for interactions
    pub prefix: String,
    /// Alias the invocation matched
    pub alias: String,
    /// Set when invoked through a slash-command interaction
    pub interaction: Option<CommandInteraction>,
}

/// Who may use privileged tiers, and who may use nothing at all
#[derive(Debug, Clone, Default)]
pub struct Access {
    operators: HashSet<String>,
    blacklist: HashSet<String>,
}

impl Access {
    pub fn new(operators: impl IntoIterator<Item = String>, blacklist: impl IntoIterator<Item = String>) -> Self {
        Self {
            operators: operators.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    pub fn is_operator(&self, user_id: &str) -> bool {
        self.operators.contains(user_id)
    }

    pub fn is_blacklisted(&self, user_id: &str) -> bool {
        self.blacklist.contains(user_id)
    }

    /// Default permission filter for a priority tier
    pub fn allows(&self, priority: i32, ctx: &dyn CommandContext) -> bool {
        if self.is_operator(&ctx.author().id) {
            return true;
        }
        let has = |permission| ctx.member().is_some_and(|m| m.has_permission(permission));
        match priority {
            p if p >= priority::OWNER => false,
            p if p >= priority::ADMIN => has(Permission::ManageGuild),
            p if p >= priority::MODERATOR => has(Permission::ManageMessages),
            _ => true,
        }
    }
}

/// A user-invokable action.
///
/// The same `call` serves text invocations and slash-command interactions;
/// `extra.interaction` is only set for the latter.
#[async_trait]
pub trait Command: Send + Sync {
    fn meta(&self) -> &CommandMeta;

    /// Whether the invoker may run this command
    fn filter(&self, ctx: &dyn CommandContext, access: &Access) -> bool {
        access.allows(self.meta().priority, ctx)
    }

    /// Platform-native schema for this command
    fn slash(&self) -> SlashCommand {
        SlashCommand::from_meta(self.meta())
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, content: String, extra: CallExtra) -> Result<(), CommandError>;
}
