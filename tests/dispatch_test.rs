//! Command dispatch integration tests
//! Run with: cargo test --test dispatch_test

use std::sync::{Arc, Once};

use async_trait::async_trait;
use serde_json::{json, Value};

use twink_bot::application::errors::{BotError, CommandError};
use twink_bot::application::messaging::{
    CallExtra, Command, CommandContext, CommandEntry, CommandInit, CommandMeta, Commander,
};
use twink_bot::application::services::Bot;
use twink_bot::domain::entities::{CommandInteraction, CommandOption, Event, Message, OptionKind, User};
use twink_bot::infrastructure::adapters::MemoryTransport;
use twink_bot::infrastructure::config::{ConfigSource, ConfigStore};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Replies with `<alias>|<content>` for every invocation
struct Recorder(CommandMeta);

#[async_trait]
impl Command for Recorder {
    fn meta(&self) -> &CommandMeta {
        &self.0
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, content: String, extra: CallExtra) -> Result<(), CommandError> {
        ctx.reply(format!("{}|{}", extra.alias, content).into()).await?;
        Ok(())
    }
}

fn recorder(aliases: &[&str]) -> Result<Arc<dyn Command>, BotError> {
    Ok(Arc::new(Recorder(CommandMeta::new(aliases.iter().copied()))))
}

fn help_recorder(_init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
    recorder(&["help", "h"])
}

fn ping_recorder(_init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
    recorder(&["ping"])
}

struct Failing(CommandMeta);

#[async_trait]
impl Command for Failing {
    fn meta(&self) -> &CommandMeta {
        &self.0
    }

    async fn call(&self, _ctx: Arc<dyn CommandContext>, content: String, _extra: CallExtra) -> Result<(), CommandError> {
        if content == "panic" {
            panic!("command exploded");
        }
        Err(CommandError::ExecutionFailed("boom".to_string()))
    }
}

fn failing(_init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
    Ok(Arc::new(Failing(CommandMeta::new(["boom"]))))
}

struct Twice(CommandMeta);

#[async_trait]
impl Command for Twice {
    fn meta(&self) -> &CommandMeta {
        &self.0
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, _content: String, _extra: CallExtra) -> Result<(), CommandError> {
        ctx.send("first".into()).await?;
        ctx.send("second".into()).await?;
        Ok(())
    }
}

fn twice(_init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
    Ok(Arc::new(Twice(CommandMeta::new(["twice"]))))
}

fn broken(_init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
    Err(BotError::Internal("cannot build".to_string()))
}

fn table() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("help", help_recorder),
        CommandEntry::new("ping", ping_recorder),
        CommandEntry::new("boom", failing),
        CommandEntry::new("twice", twice),
        CommandEntry::new("broken", broken),
    ]
}

async fn start(extra_config: Value) -> (Arc<Bot>, Arc<MemoryTransport>, Arc<Commander>) {
    ensure_init();
    let store = ConfigStore::with_sources([
        ConfigSource::raw(json!({"SQL_PATH": ":memory:", "ERROR_CHANNEL": "errors"})),
        ConfigSource::raw(extra_config),
    ])
    .unwrap();
    let transport = Arc::new(MemoryTransport::new(User::bot("100", "twink")));
    let bot = Bot::new(store, transport.clone()).unwrap();

    let commander = bot.load_plugin::<Commander>().unwrap();
    assert_eq!(commander.load_commands(&table()).unwrap(), 4);

    bot.login("token").await.unwrap();
    bot.dispatch(Event::Ready).await;
    (bot, transport, commander)
}

fn from_alice(content: &str) -> Event {
    Event::MessageCreate(Message::new("chan", User::new("1", "alice"), content))
}

fn contents(messages: Vec<twink_bot::domain::entities::OutgoingMessage>) -> Vec<String> {
    messages.into_iter().map(|m| m.content).collect()
}

#[tokio::test]
async fn test_help_receives_remaining_text() {
    let (bot, transport, _commander) = start(json!({})).await;

    bot.dispatch(from_alice("!help ping")).await;
    bot.dispatch(from_alice("  !H  ")).await;

    assert_eq!(contents(transport.sent_to("chan")), vec!["help|ping", "h|"]);
}

#[tokio::test]
async fn test_non_commands_and_bots_are_ignored() {
    let (bot, transport, _commander) = start(json!({})).await;

    bot.dispatch(from_alice("hello there")).await;
    bot.dispatch(from_alice("!pingu")).await;
    bot.dispatch(Event::MessageCreate(Message::new("chan", User::bot("7", "otherbot"), "!ping"))).await;
    bot.dispatch(Event::MessageCreate(Message::new("chan", User::bot("100", "twink"), "!ping"))).await;

    assert!(transport.sent_to("chan").is_empty());
}

#[tokio::test]
async fn test_failing_command_is_reported_once_and_bot_keeps_serving() {
    let (bot, transport, _commander) = start(json!({})).await;

    bot.dispatch(from_alice("!boom")).await;
    let reports = transport.sent_to("errors");
    assert_eq!(reports.len(), 1);
    assert!(reports[0].content.contains("Error running command boom"));
    assert!(reports[0].content.contains("boom"));

    bot.dispatch(from_alice("!ping")).await;
    assert_eq!(contents(transport.sent_to("chan")), vec!["ping|"]);
    assert_eq!(transport.sent_to("errors").len(), 1);
}

#[tokio::test]
async fn test_panicking_command_is_contained() {
    let (bot, transport, _commander) = start(json!({})).await;

    bot.dispatch(from_alice("!boom panic")).await;
    let reports = transport.sent_to("errors");
    assert_eq!(reports.len(), 1);
    assert!(reports[0].content.contains("command exploded"));

    bot.dispatch(from_alice("!ping")).await;
    assert_eq!(transport.sent_to("chan").len(), 1);
}

#[tokio::test]
async fn test_inline_errors_go_to_invoking_channel() {
    let (bot, transport, _commander) = start(json!({"INLINE_ERRORS": true})).await;

    bot.dispatch(from_alice("!boom")).await;

    assert!(transport.sent_to("errors").is_empty());
    let inline = transport.sent_to("chan");
    assert_eq!(inline.len(), 1);
    assert!(inline[0].content.starts_with("**Error running command boom**"));
}

#[tokio::test]
async fn test_mention_prefix() {
    let (bot, transport, _commander) = start(json!({})).await;

    bot.dispatch(from_alice("<@100> ping")).await;
    bot.dispatch(from_alice("<@!100> help me")).await;

    assert_eq!(contents(transport.sent_to("chan")), vec!["ping|", "help|me"]);
}

#[tokio::test]
async fn test_guild_prefix_override() {
    let (bot, transport, commander) = start(json!({"MENTION_PREFIX": false})).await;
    commander
        .prefix_service()
        .set("g1", vec!["?".to_string()])
        .await
        .unwrap();

    let in_guild = |content: &str| {
        Event::MessageCreate(Message::new("chan", User::new("1", "alice"), content).in_guild("g1"))
    };
    bot.dispatch(in_guild("!ping")).await;
    bot.dispatch(in_guild("?ping")).await;
    bot.dispatch(from_alice("!ping")).await;
    bot.dispatch(from_alice("<@100> ping")).await;

    assert_eq!(contents(transport.sent_to("chan")), vec!["ping|", "ping|"]);
}

#[tokio::test]
async fn test_blacklist_and_dev_mode() {
    let (bot, transport, _commander) = start(json!({
        "BLACKLIST": ["666"],
        "DEV_MODE": true,
        "DEV_GUILDS": ["dev"],
        "OPERATORS": ["42"],
    }))
    .await;

    let send = |user: User, guild: &str| {
        Event::MessageCreate(Message::new("chan", user, "!ping").in_guild(guild))
    };
    bot.dispatch(send(User::new("666", "troll"), "dev")).await;
    bot.dispatch(send(User::new("1", "alice"), "prod")).await;
    bot.dispatch(send(User::new("1", "alice"), "dev")).await;
    bot.dispatch(send(User::new("42", "owner"), "prod")).await;

    assert_eq!(transport.sent_to("chan").len(), 2);
}

#[tokio::test]
async fn test_dev_mode_limits_interactions() {
    let (bot, transport, _commander) = start(json!({
        "DEV_MODE": true,
        "DEV_GUILDS": ["dev"],
        "OPERATORS": ["42"],
    }))
    .await;

    let invoke = |user: User, guild: Option<&str>| {
        let mut interaction = CommandInteraction::new("ping", "chan", user);
        interaction.guild_id = guild.map(str::to_string);
        Event::InteractionCreate(interaction)
    };
    bot.dispatch(invoke(User::new("1", "alice"), Some("prod"))).await;
    bot.dispatch(invoke(User::new("1", "alice"), None)).await;
    bot.dispatch(invoke(User::new("1", "alice"), Some("dev"))).await;
    bot.dispatch(invoke(User::new("42", "owner"), None)).await;

    assert_eq!(transport.interaction_replies().len(), 2);
}

#[tokio::test]
async fn test_interaction_uses_same_command_body() {
    let (bot, transport, _commander) = start(json!({})).await;

    let interaction = CommandInteraction::new("help", "chan", User::new("1", "alice"))
        .with_option(CommandOption::new("command", OptionKind::String, "ping"));
    bot.dispatch(Event::InteractionCreate(interaction)).await;

    assert_eq!(contents(transport.interaction_replies()), vec!["help|ping"]);
    assert!(transport.sent_to("chan").is_empty());
}

#[tokio::test]
async fn test_interaction_replies_once_then_sends() {
    let (bot, transport, _commander) = start(json!({})).await;

    let interaction = CommandInteraction::new("twice", "chan", User::new("1", "alice"));
    bot.dispatch(Event::InteractionCreate(interaction)).await;

    assert_eq!(contents(transport.interaction_replies()), vec!["first"]);
    assert_eq!(contents(transport.sent_to("chan")), vec!["second"]);
}

#[tokio::test]
async fn test_slash_commands_registered_on_ready() {
    let (_bot, transport, commander) = start(json!({})).await;

    let names: Vec<String> = commander.slash_commands().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["help", "ping", "boom", "twice"]);
    assert!(transport
        .outbound()
        .iter()
        .any(|op| matches!(op, twink_bot::infrastructure::adapters::Outbound::SetCommands(c) if c.len() == 4)));
}
