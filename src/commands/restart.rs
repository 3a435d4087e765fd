use std::sync::Arc;

use async_trait::async_trait;

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::{priority, CallExtra, Command, CommandContext, CommandInit, CommandMeta};
use crate::plugins::{BotHandle, RestartPlugin};

pub struct Restart {
    meta: CommandMeta,
    bot: BotHandle,
}

impl Restart {
    pub fn create(init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
        Ok(Arc::new(Self {
            meta: CommandMeta::new(["restart", "reboot"])
                .with_priority(priority::OWNER)
                .with_description("Restart the bot"),
            bot: init.bot,
        }))
    }
}

#[async_trait]
impl Command for Restart {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, _content: String, _extra: CallExtra) -> Result<(), CommandError> {
        let plugin = self
            .bot
            .get()
            .ok()
            .and_then(|bot| bot.plugin::<RestartPlugin>())
            .ok_or_else(|| CommandError::ExecutionFailed("restart plugin is not loaded".to_string()))?;

        ctx.reply("Restarting...".into()).await?;
        plugin
            .restart(ctx.channel_id())
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
    }
}
