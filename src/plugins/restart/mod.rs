//! Restart plugin - restarts the process and announces when it is back

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::errors::{BotError, PluginError};
use crate::domain::entities::OutgoingMessage;
use crate::plugins::sql::SqlPlugin;
use crate::plugins::{BotHandle, Dependency, Plugin, PluginContext, PluginFactory};

/// kv key holding the channel to notify after a supervised restart
pub const RESTART_CHANNEL_KEY: &str = "restart_channel";

/// Command-line flag carrying the channel to notify after a respawn
pub const RESTART_CHANNEL_FLAG: &str = "--last-restart-channel";

pub struct RestartPlugin {
    bot: BotHandle,
    sql: Arc<SqlPlugin>,
    supervised: bool,
    last_channel: Option<String>,
}

impl RestartPlugin {
    /// Restart the process and announce the restart in `channel_id` afterwards.
    ///
    /// Under a supervisor the intent is persisted and the process exits with
    /// code 1; otherwise a new process is spawned and this one exits with 0.
    /// The bot is cleaned up before exiting.
    pub async fn restart(&self, channel_id: &str) -> Result<(), BotError> {
        let code = self.prepare(channel_id).await?;
        let bot = self.bot.get()?;
        if let Err(e) = bot.cleanup().await {
            warn!("Cleanup before restart failed: {}", e);
        }
        info!("Restarting (exit code {})", code);
        std::process::exit(code);
    }

    /// Record or hand over the restart channel. Returns the exit code to use.
    pub async fn prepare(&self, channel_id: &str) -> Result<i32, BotError> {
        if self.supervised {
            self.sql.kv_set(RESTART_CHANNEL_KEY, channel_id).await?;
            return Ok(1);
        }

        let exe = std::env::current_exe().map_err(|e| BotError::Internal(format!("cannot locate executable: {}", e)))?;
        let args = respawn_args(std::env::args().skip(1), channel_id);
        Command::new(&exe)
            .args(&args)
            .spawn()
            .map_err(|e| BotError::Internal(format!("failed to spawn {}: {}", exe.display(), e)))?;
        Ok(0)
    }

    pub fn is_supervised(&self) -> bool {
        self.supervised
    }
}

/// Current arguments with any previous restart channel replaced by `channel_id`
pub fn respawn_args(args: impl IntoIterator<Item = String>, channel_id: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if arg == RESTART_CHANNEL_FLAG {
            skip_value = true;
            continue;
        }
        if arg.starts_with(&format!("{}=", RESTART_CHANNEL_FLAG)) {
            continue;
        }
        out.push(arg);
    }
    out.push(format!("{}={}", RESTART_CHANNEL_FLAG, channel_id));
    out
}

#[async_trait]
impl Plugin for RestartPlugin {
    async fn load(&self) -> Result<(), PluginError> {
        let failed = |reason: String| PluginError::Load {
            name: Self::NAME.to_string(),
            reason,
        };

        let persisted = self.sql.kv_get(RESTART_CHANNEL_KEY).await.map_err(|e| failed(e.to_string()))?;
        let Some(channel) = self.last_channel.clone().or(persisted.clone()) else {
            return Ok(());
        };
        if persisted.is_some() {
            self.sql
                .kv_delete(RESTART_CHANNEL_KEY)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }

        let bot = self.bot.get().map_err(|e| failed(e.to_string()))?;
        // The channel may have been deleted while we were down.
        if let Err(e) = bot
            .transport()
            .send_message(&channel, OutgoingMessage::text("Restarted."))
            .await
        {
            warn!("Could not announce restart in {}: {}", channel, e);
        }
        Ok(())
    }
}

impl PluginFactory for RestartPlugin {
    const NAME: &'static str = "RestartPlugin";

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<SqlPlugin>()]
    }

    fn create(ctx: PluginContext) -> Result<Self, BotError> {
        let supervised = ctx.config.get_typed_or("SUPERVISED", false)?;
        let last_channel = ctx.config.get_typed::<Option<String>>("LAST_RESTART_CHANNEL")?;
        let sql = ctx.bot.get()?.plugin::<SqlPlugin>().ok_or_else(|| PluginError::Dependency {
            name: Self::NAME.to_string(),
            dependency: SqlPlugin::NAME.to_string(),
        })?;

        Ok(Self {
            bot: ctx.bot,
            sql,
            supervised,
            last_channel,
        })
    }
}
