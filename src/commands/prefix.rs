//! `prefix` - show or change the guild's command prefixes

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::{
    priority, CallExtra, Command, CommandContext, CommandInit, CommandMeta, Commander, SlashCommand, SlashOption,
};
use crate::domain::entities::OptionKind;
use crate::plugins::BotHandle;

/// Most prefixes a guild may configure
const MAX_PREFIXES: usize = 10;

pub struct Prefix {
    meta: CommandMeta,
    bot: BotHandle,
}

impl Prefix {
    pub fn create(init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
        Ok(Arc::new(Self {
            meta: CommandMeta::new(["prefix", "prefixes"])
                .with_priority(priority::ADMIN)
                .with_description("Show or change this server's command prefixes")
                .with_usage("prefix [list | set <prefix...> | reset]")
                .with_example("prefix set ? twink!")
                .with_example("prefix reset"),
            bot: init.bot,
        }))
    }

    fn commander(&self) -> Result<Arc<Commander>, CommandError> {
        self.bot
            .get()
            .ok()
            .and_then(|bot| bot.plugin::<Commander>())
            .ok_or_else(|| CommandError::ExecutionFailed("commands are not loaded".to_string()))
    }
}

#[async_trait]
impl Command for Prefix {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn slash(&self) -> SlashCommand {
        SlashCommand::from_meta(&self.meta)
            .with_option(SlashOption::new("list", "Show the active prefixes", OptionKind::SubCommand))
            .with_option(
                SlashOption::new("set", "Replace the prefixes", OptionKind::SubCommand).with_option(
                    SlashOption::new("prefixes", "Space-separated prefixes", OptionKind::String).required(),
                ),
            )
            .with_option(SlashOption::new("reset", "Go back to the default prefixes", OptionKind::SubCommand))
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, content: String, _extra: CallExtra) -> Result<(), CommandError> {
        let commander = self.commander()?;
        let Some(guild_id) = ctx.guild_id().map(str::to_string) else {
            return Err(CommandError::InvalidArgs("prefixes can only be configured in a server".to_string()));
        };

        let mut words = content.split_whitespace();
        let reply = match words.next().map(str::to_lowercase).as_deref() {
            None | Some("list") => {
                let active = commander.prefix_service().get(&guild_id).await?;
                let (prefixes, source) = match active {
                    Some(prefixes) => (prefixes, "custom"),
                    None => (commander.default_prefixes().to_vec(), "default"),
                };
                format!("Prefixes ({}): {}", source, quote(&prefixes))
            }
            Some("set") => {
                let prefixes: Vec<String> = words.map(str::to_string).collect();
                if prefixes.is_empty() || prefixes.len() > MAX_PREFIXES {
                    return Err(CommandError::InvalidArgs(format!(
                        "give between 1 and {} prefixes",
                        MAX_PREFIXES
                    )));
                }
                commander.prefix_service().set(&guild_id, prefixes.clone()).await?;
                format!("Prefixes set to {}", quote(&prefixes))
            }
            Some("reset") => {
                commander.prefix_service().reset(&guild_id).await?;
                format!("Prefixes reset to {}", quote(commander.default_prefixes()))
            }
            Some(other) => {
                return Err(CommandError::InvalidArgs(format!(
                    "unknown sub-command `{}`, usage: {}",
                    other,
                    self.meta.usage.as_deref().unwrap_or("prefix")
                )));
            }
        };
        ctx.reply(reply.into()).await?;
        Ok(())
    }
}

fn quote(prefixes: &[String]) -> String {
    prefixes
        .iter()
        .map(|p| format!("`{}`", p))
        .collect::<Vec<_>>()
        .join(" ")
}
