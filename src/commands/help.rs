//! `help` - list commands or describe one

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::{
    priority, CallExtra, Command, CommandContext, CommandInit, CommandMeta, Commander, LoadedCommand, SlashCommand,
    SlashOption,
};
use crate::domain::entities::OptionKind;
use crate::plugins::BotHandle;

pub struct Help {
    meta: CommandMeta,
    bot: BotHandle,
}

impl Help {
    pub fn create(init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
        Ok(Arc::new(Self {
            meta: CommandMeta::new(["help", "commands", "h"])
                .with_description("List commands, or show details for one")
                .with_usage("help [command]")
                .with_example("help ping"),
            bot: init.bot,
        }))
    }
}

#[async_trait]
impl Command for Help {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn slash(&self) -> SlashCommand {
        SlashCommand::from_meta(&self.meta)
            .with_option(SlashOption::new("command", "Command to describe", OptionKind::String))
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, content: String, extra: CallExtra) -> Result<(), CommandError> {
        let commander = self
            .bot
            .get()
            .ok()
            .and_then(|bot| bot.plugin::<Commander>())
            .ok_or_else(|| CommandError::ExecutionFailed("commands are not loaded".to_string()))?;

        let text = match content.split_whitespace().next() {
            None => overview(&commander.commands(), &extra.prefix),
            Some(name) => match commander.find(name) {
                Some(command) if !command.is_hidden() => details(&command, &extra.prefix),
                _ => format!("No command named `{}`.", name),
            },
        };
        ctx.reply(text.into()).await?;
        Ok(())
    }
}

fn overview(commands: &[LoadedCommand], prefix: &str) -> String {
    let mut tiers: BTreeMap<std::cmp::Reverse<i32>, Vec<&LoadedCommand>> = BTreeMap::new();
    for command in commands.iter().filter(|c| !c.is_hidden()) {
        tiers.entry(std::cmp::Reverse(command.priority())).or_default().push(command);
    }

    let mut text = String::from("**Commands**\n");
    for (std::cmp::Reverse(tier), commands) in tiers {
        text.push_str(&format!("\n__{}__\n", priority::label(tier)));
        for command in commands {
            text.push_str(&format!(
                "`{}{}` {}\n",
                prefix,
                command.slash_name(),
                command.command.meta().short_description
            ));
        }
    }
    text
}

fn details(command: &LoadedCommand, prefix: &str) -> String {
    let meta = command.command.meta();
    let mut text = format!("**{}{}**\n", prefix, meta.name());
    text.push_str(meta.long_description.as_deref().unwrap_or(&meta.short_description));
    text.push('\n');
    if command.aliases.len() > 1 {
        text.push_str(&format!("Aliases: {}\n", command.aliases.join(", ")));
    }
    if let Some(usage) = &meta.usage {
        text.push_str(&format!("Usage: `{}{}`\n", prefix, usage));
    }
    for example in &meta.examples {
        text.push_str(&format!("Example: `{}{}`\n", prefix, example));
    }
    text.push_str(&format!("Tier: {}", priority::label(meta.priority)));
    text
}
