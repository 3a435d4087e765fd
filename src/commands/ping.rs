use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::{CallExtra, Command, CommandContext, CommandInit, CommandMeta};

pub struct Ping {
    meta: CommandMeta,
}

impl Ping {
    pub fn create(_init: CommandInit) -> Result<Arc<dyn Command>, BotError> {
        Ok(Arc::new(Self {
            meta: CommandMeta::new(["ping"]).with_description("Check that the bot is responding"),
        }))
    }
}

#[async_trait]
impl Command for Ping {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    async fn call(&self, ctx: Arc<dyn CommandContext>, _content: String, _extra: CallExtra) -> Result<(), CommandError> {
        let latency = (Utc::now() - ctx.created_at()).num_milliseconds().max(0);
        ctx.reply(format!("Pong! ({} ms)", latency).into()).await?;
        Ok(())
    }
}
