use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use twink_bot::application::errors::BotError;
use twink_bot::application::messaging::Commander;
use twink_bot::application::services::Bot;
use twink_bot::commands;
use twink_bot::infrastructure::adapters::ConsoleTransport;
use twink_bot::infrastructure::config::{ConfigSource, ConfigStore};
use twink_bot::plugins::RestartPlugin;

#[derive(Parser)]
#[command(name = "twink-bot")]
#[command(about = "Plugin and command core for a chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (.json, .yaml or .yml)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Read the config from this key of the file; repeat to go deeper
    #[arg(long)]
    drill: Vec<String>,

    /// Bot token (overrides config)
    #[arg(short, long)]
    token: Option<String>,

    /// Channel to notify once a restart has completed
    #[arg(long)]
    last_restart_channel: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Print a default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Unhandled panic: {}", info);
    }));

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(run_bot(&cli)) {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Version) => {
            println!("twink-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::InitConfig) => init_config(),
    }
}

async fn run_bot(cli: &Cli) -> Result<(), BotError> {
    let config = ConfigStore::new();
    if Path::new(&cli.config).exists() {
        config.load_source(ConfigSource::file(&cli.config).drill(cli.drill.iter().cloned()))?;
    } else {
        tracing::warn!("Config file {} not found, using environment only", cli.config);
    }
    config.load_source(ConfigSource::env(true))?;
    config.load_source(ConfigSource::raw(cli_overrides(cli)))?;

    let bot = Bot::new(Arc::clone(&config), Arc::new(ConsoleTransport::new()))?;
    let commander = bot.load_plugin::<Commander>()?;
    commander.load_commands(&commands::table())?;
    bot.load_plugin::<RestartPlugin>()?;

    let token: String = bot.make_provider("main").get_typed_or("TOKEN", "console".to_string())?;
    bot.login(&token).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
    bot.cleanup().await?;

    for (provider, keys) in config.providers() {
        tracing::debug!("Config provider {} read {:?}", provider, keys);
    }
    Ok(())
}

/// CLI flags that override every other config source
fn cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();
    if let Some(token) = &cli.token {
        overrides.insert("TOKEN".to_string(), json!(token));
    }
    if let Some(channel) = &cli.last_restart_channel {
        overrides.insert("LAST_RESTART_CHANNEL".to_string(), json!(channel));
    }
    Value::Object(overrides)
}

fn init_config() {
    let config = json!({
        "TOKEN": "",
        "ERROR_CHANNEL": null,
        "PREFIXES": ["!"],
        "MENTION_PREFIX": true,
        "INLINE_ERRORS": false,
        "DEV_MODE": false,
        "DEV_GUILDS": [],
        "OPERATORS": [],
        "BLACKLIST": [],
        "SQL_PATH": "twink-bot.db",
        "SUPERVISED": false,
    });
    match serde_yaml::to_string(&config) {
        Ok(yaml) => println!("{}", yaml),
        Err(e) => tracing::error!("Failed to render config: {}", e),
    }
}
