//! Commander - routes messages and interactions to commands

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::command::{Access, CallExtra, Command};
use super::context::{CommandContext, TextContext};
use super::interaction::InteractionContext;
use super::loader::{CommandEntry, CommandInit, LoadFilter};
use super::parser::match_text;
use super::registry::{CommandRegistry, LoadedCommand};
use super::slash::SlashCommand;
use crate::application::cache::Cache;
use crate::application::errors::{BotError, CommandError, PluginError, StorageError};
use crate::application::services::bot::{error_chain, panic_message, truncate};
use crate::application::services::{Bot, Listener, PrefixService};
use crate::domain::entities::{CommandInteraction, Event, EventKind, Message, OutgoingMessage};
use crate::plugins::sql::SqlPlugin;
use crate::plugins::{BotHandle, Dependency, Plugin, PluginContext, PluginFactory};

/// Longest error body posted back to the invoking channel
const INLINE_LIMIT: usize = 1500;

#[derive(Debug, Clone)]
struct Settings {
    default_prefixes: Vec<String>,
    mention_prefix: bool,
    inline_errors: bool,
    dev_mode: bool,
    dev_guilds: HashSet<String>,
    filter: LoadFilter,
}

/// The command plugin.
///
/// Owns the loaded commands and turns `messageCreate` and
/// `interactionCreate` events into command calls.
pub struct Commander {
    bot: BotHandle,
    settings: Settings,
    access: Access,
    prefixes: PrefixService,
    registry: RwLock<CommandRegistry>,
    mention_prefixes: Cache<String, Vec<String>>,
}

impl Commander {
    /// Construct and register every allowed entry of `table`.
    ///
    /// A command that fails to construct or register is logged and skipped.
    /// Returns the number of commands loaded.
    pub fn load_commands(&self, table: &[CommandEntry]) -> Result<usize, BotError> {
        let bot = self.bot.get()?;
        let mut loaded = 0;

        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        for entry in table {
            if !self.settings.filter.allows(entry.name) {
                debug!("Skipping filtered command {}", entry.name);
                continue;
            }
            let init = CommandInit {
                bot: bot.handle(),
                config: bot.make_provider(format!("command-{}", entry.name)),
            };
            let command = match (entry.create)(init) {
                Ok(command) => command,
                Err(e) => {
                    error!("Failed to load command {}: {}", entry.name, e);
                    continue;
                }
            };
            match registry.register(entry.name, command) {
                Ok(()) => loaded += 1,
                Err(reason) => error!("Failed to load command {}: {}", entry.name, reason),
            }
        }

        registry.sort();
        let dropped = registry.validate_aliases();
        info!("Loaded {} commands ({} conflicting aliases dropped)", loaded, dropped);
        Ok(loaded)
    }

    /// Snapshot of the loaded commands in match order
    pub fn commands(&self) -> Vec<LoadedCommand> {
        self.registry().all().to_vec()
    }

    pub fn command(&self, name: &str) -> Option<LoadedCommand> {
        self.registry().get(name).cloned()
    }

    /// The command `alias` would invoke
    pub fn find(&self, alias: &str) -> Option<LoadedCommand> {
        self.registry().find(alias).cloned()
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    pub fn prefix_service(&self) -> &PrefixService {
        &self.prefixes
    }

    pub fn default_prefixes(&self) -> &[String] {
        &self.settings.default_prefixes
    }

    /// Active prefixes for a guild, or for direct messages when `guild_id` is `None`
    pub async fn prefixes_for(&self, guild_id: Option<&str>) -> Result<Vec<String>, StorageError> {
        let mut prefixes = match guild_id {
            Some(guild) => self.prefixes.get(guild).await?,
            None => None,
        }
        .unwrap_or_else(|| self.settings.default_prefixes.clone());

        if self.settings.mention_prefix {
            if let Ok(bot) = self.bot.get() {
                if let Some(me) = bot.transport().current_user() {
                    let forms = self
                        .mention_prefixes
                        .get(me.id.clone(), || vec![format!("<@{}>", me.id), format!("<@!{}>", me.id)]);
                    prefixes.extend(forms);
                }
            }
        }
        Ok(prefixes)
    }

    /// Schemas for every visible command
    pub fn slash_commands(&self) -> Vec<SlashCommand> {
        self.registry()
            .all()
            .iter()
            .filter(|c| !c.is_hidden())
            .map(|c| c.command.slash())
            .collect()
    }

    pub async fn register_slash_commands(&self) -> Result<usize, BotError> {
        let bot = self.bot.get()?;
        let commands = self.slash_commands();
        bot.transport().set_application_commands(&commands).await?;
        info!("Registered {} slash commands", commands.len());
        Ok(commands.len())
    }

    /// Match a text message and run the command it invokes.
    ///
    /// Returns whether a command was invoked.
    pub async fn handle_message(&self, message: Message) -> Result<bool, BotError> {
        let bot = self.bot.get()?;
        if message.author.is_bot || self.is_self(&bot, &message.author.id) {
            return Ok(false);
        }
        if !self.in_dev_scope(message.guild_id.as_deref(), &message.author.id) {
            return Ok(false);
        }

        let prefixes = self.prefixes_for(message.guild_id.as_deref()).await?;
        let commands = self.commands();
        let author = message.author.clone();
        let text = message.content.clone();
        let ctx: Arc<dyn CommandContext> = Arc::new(TextContext::new(message, Arc::clone(bot.transport())));

        let found = match_text(&text, &prefixes, &commands, |command| {
            command.command.filter(ctx.as_ref(), &self.access)
                && !author.is_bot
                && !self.access.is_blacklisted(&author.id)
        });
        let Some(found) = found else {
            return Ok(false);
        };

        let command = commands[found.index].clone();
        debug!("{} invoked {} via {}{}", author.username, command.name, found.prefix, found.alias);
        let extra = CallExtra {
            prefix: found.prefix,
            alias: found.alias,
            interaction: None,
        };
        self.run_command(&bot, command, ctx, found.content, extra).await;
        Ok(true)
    }

    /// Run the command an interaction names, if the invoker may use it
    pub async fn handle_interaction(&self, interaction: CommandInteraction) -> Result<bool, BotError> {
        let bot = self.bot.get()?;
        if interaction.user.is_bot {
            return Ok(false);
        }
        if !self.in_dev_scope(interaction.guild_id.as_deref(), &interaction.user.id) {
            return Ok(false);
        }

        let Some(command) = self.registry().by_slash_name(&interaction.command_name).cloned() else {
            warn!("Interaction for unknown command {}", interaction.command_name);
            return Ok(false);
        };

        let alias = interaction.command_name.clone();
        let author_id = interaction.user.id.clone();
        let context = InteractionContext::new(interaction.clone(), Arc::clone(bot.transport()));
        let content = context.content().to_string();
        let ctx: Arc<dyn CommandContext> = Arc::new(context);

        if self.access.is_blacklisted(&author_id) || !command.command.filter(ctx.as_ref(), &self.access) {
            let denial = OutgoingMessage::text("You do not have permission to use this command.").ephemeral();
            ctx.reply(denial).await?;
            return Ok(false);
        }

        let extra = CallExtra {
            prefix: "/".to_string(),
            alias,
            interaction: Some(interaction),
        };
        self.run_command(&bot, command, ctx, content, extra).await;
        Ok(true)
    }

    async fn run_command(
        &self,
        bot: &Bot,
        command: LoadedCommand,
        ctx: Arc<dyn CommandContext>,
        content: String,
        extra: CallExtra,
    ) {
        let call: Arc<dyn Command> = Arc::clone(&command.command);
        let call_ctx = Arc::clone(&ctx);
        let outcome = tokio::spawn(async move { call.call(call_ctx, content, extra).await }).await;

        let body = match outcome {
            Ok(Ok(())) => return,
            // Mistakes by the invoker are answered in place, not reported.
            Ok(Err(e @ (CommandError::InvalidArgs(_) | CommandError::PermissionDenied))) => {
                debug!("{} rejected its input: {}", command.name, e);
                if let Err(e) = ctx.reply(OutgoingMessage::text(user_facing(&e)).ephemeral()).await {
                    warn!("Failed to answer {}: {}", command.name, e);
                }
                return;
            }
            Ok(Err(e)) => error_chain(&e),
            Err(e) if e.is_panic() => panic_message(e),
            Err(_) => return,
        };

        let label = format!("Error running command {}", command.name);
        if self.settings.inline_errors {
            error!("{}: {}", label, body);
            let text = format!("**{}**\n```\n{}\n```", label, truncate(&body, INLINE_LIMIT));
            if let Err(e) = ctx.send(OutgoingMessage::text(text)).await {
                warn!("Failed to post inline error: {}", e);
            }
        } else {
            bot.report_text(&label, &body).await;
        }
    }

    fn is_self(&self, bot: &Bot, user_id: &str) -> bool {
        bot.transport().current_user().is_some_and(|me| me.id == user_id)
    }

    fn in_dev_scope(&self, guild_id: Option<&str>, user_id: &str) -> bool {
        if !self.settings.dev_mode {
            return true;
        }
        self.access.is_operator(user_id) || guild_id.is_some_and(|g| self.settings.dev_guilds.contains(g))
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, CommandRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn user_facing(error: &CommandError) -> String {
    match error {
        CommandError::InvalidArgs(reason) => format!("Invalid arguments: {}", reason),
        CommandError::PermissionDenied => "You do not have permission to do that.".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Plugin for Commander {
    async fn load(&self) -> Result<(), PluginError> {
        let bot = self.bot.get().map_err(|e| PluginError::Load {
            name: Self::NAME.to_string(),
            reason: e.to_string(),
        })?;

        bot.listen(EventKind::MessageCreate, "commander:message", Arc::new(MessageListener(self.bot.clone())));
        bot.listen(
            EventKind::InteractionCreate,
            "commander:interaction",
            Arc::new(InteractionListener(self.bot.clone())),
        );

        // Not every transport knows about slash commands.
        if let Err(e) = self.register_slash_commands().await {
            warn!("Slash commands were not registered: {}", e);
        }
        Ok(())
    }
}

impl PluginFactory for Commander {
    const NAME: &'static str = "Commander";

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<SqlPlugin>()]
    }

    fn create(ctx: PluginContext) -> Result<Self, BotError> {
        let config = &ctx.config;
        let settings = Settings {
            default_prefixes: config.get_typed_or("PREFIXES", vec!["!".to_string()])?,
            mention_prefix: config.get_typed_or("MENTION_PREFIX", true)?,
            inline_errors: config.get_typed_or("INLINE_ERRORS", false)?,
            dev_mode: config.get_typed_or("DEV_MODE", false)?,
            dev_guilds: config.get_typed_or::<Vec<String>>("DEV_GUILDS", Vec::new())?.into_iter().collect(),
            filter: LoadFilter::new(
                config.get_typed("COMMAND_WHITELIST")?,
                config.get_typed_or("COMMAND_BLACKLIST", Vec::new())?,
            ),
        };
        let access = Access::new(
            config.get_typed_or::<Vec<String>>("OPERATORS", Vec::new())?,
            config.get_typed_or::<Vec<String>>("BLACKLIST", Vec::new())?,
        );

        let bot = ctx.bot.get()?;
        let sql = bot
            .plugin::<SqlPlugin>()
            .ok_or_else(|| PluginError::Dependency {
                name: Self::NAME.to_string(),
                dependency: SqlPlugin::NAME.to_string(),
            })?;

        Ok(Self {
            bot: ctx.bot,
            settings,
            access,
            prefixes: PrefixService::new(sql.store()),
            registry: RwLock::new(CommandRegistry::new()),
            mention_prefixes: Cache::new(),
        })
    }
}

struct MessageListener(BotHandle);

#[async_trait]
impl Listener for MessageListener {
    async fn handle(&self, event: Event) -> Result<(), BotError> {
        let Event::MessageCreate(message) = event else {
            return Ok(());
        };
        if let Some(commander) = self.0.get()?.plugin::<Commander>() {
            commander.handle_message(message).await?;
        }
        Ok(())
    }
}

struct InteractionListener(BotHandle);

#[async_trait]
impl Listener for InteractionListener {
    async fn handle(&self, event: Event) -> Result<(), BotError> {
        let Event::InteractionCreate(interaction) = event else {
            return Ok(());
        };
        if let Some(commander) = self.0.get()?.plugin::<Commander>() {
            commander.handle_interaction(interaction).await?;
        }
        Ok(())
    }
}
