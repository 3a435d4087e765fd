//! Plugin trait definitions

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::application::errors::{BotError, PluginError};
use crate::application::services::Bot;
use crate::infrastructure::config::ConfigProvider;

/// Core plugin trait that all plugins must implement.
///
/// A plugin is constructed once per bot, then `load` runs once the
/// connection is ready and `cleanup` runs once during shutdown.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Called once the transport reports ready
    async fn load(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once during shutdown, in registration order
    async fn cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Construction side of a plugin, keyed by the implementing type
pub trait PluginFactory: Plugin + Sized {
    /// Stable name used for logging and the config provider label
    const NAME: &'static str;

    /// Plugins that must be registered before this one is constructed
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn create(ctx: PluginContext) -> Result<Self, BotError>;
}

/// What a plugin receives at construction
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub bot: BotHandle,
    pub config: ConfigProvider,
}

/// Back-reference from a plugin to its owning bot.
///
/// Holds a weak pointer so plugins never keep the bot alive.
#[derive(Clone)]
pub struct BotHandle(Weak<Bot>);

impl BotHandle {
    pub(crate) fn new(bot: Weak<Bot>) -> Self {
        Self(bot)
    }

    pub fn get(&self) -> Result<Arc<Bot>, BotError> {
        self.0
            .upgrade()
            .ok_or_else(|| BotError::Internal("bot has already been dropped".to_string()))
    }
}

impl fmt::Debug for BotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotHandle")
    }
}

/// A plugin another plugin depends on
#[derive(Clone, Copy)]
pub struct Dependency {
    name: &'static str,
    load: fn(&Bot) -> Result<(), BotError>,
}

impl Dependency {
    pub fn of<P: PluginFactory>() -> Self {
        Self {
            name: P::NAME,
            load: load_dependency::<P>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn load(&self, bot: &Bot) -> Result<(), BotError> {
        (self.load)(bot)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.name).finish()
    }
}

fn load_dependency<P: PluginFactory>(bot: &Bot) -> Result<(), BotError> {
    bot.load_plugin::<P>().map(|_| ())
}
