//! Invocation context shared by text and interaction commands

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::errors::TransportError;
use crate::domain::entities::{Attachment, CommandInteraction, Member, Mentions, Message, OutgoingMessage, User};
use crate::domain::traits::Transport;

/// Capabilities a command body may rely on, whether it was invoked by a text
/// message or by a slash-command interaction.
#[async_trait]
pub trait CommandContext: Send + Sync {
    fn id(&self) -> &str;

    /// Full text of the invocation
    fn content(&self) -> &str;

    fn author(&self) -> &User;

    fn member(&self) -> Option<&Member>;

    fn guild_id(&self) -> Option<&str>;

    fn channel_id(&self) -> &str;

    fn mentions(&self) -> &Mentions;

    fn attachments(&self) -> &[Attachment];

    fn created_at(&self) -> DateTime<Utc>;

    /// The underlying interaction, for commands with interaction-only behaviour
    fn interaction(&self) -> Option<&CommandInteraction> {
        None
    }

    fn transport(&self) -> &Arc<dyn Transport>;

    /// Send to the invoking channel
    async fn send(&self, message: OutgoingMessage) -> Result<Message, TransportError>;

    /// Respond to the invocation
    async fn reply(&self, message: OutgoingMessage) -> Result<Message, TransportError> {
        self.send(message).await
    }

    /// React to the invoking message
    async fn react(&self, emoji: &str) -> Result<(), TransportError>;
}

/// Context for a command invoked by a text message
pub struct TextContext {
    message: Message,
    transport: Arc<dyn Transport>,
}

impl TextContext {
    pub fn new(message: Message, transport: Arc<dyn Transport>) -> Self {
        Self { message, transport }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}

#[async_trait]
impl CommandContext for TextContext {
    fn id(&self) -> &str {
        &self.message.id
    }

    fn content(&self) -> &str {
        &self.message.content
    }

    fn author(&self) -> &User {
        &self.message.author
    }

    fn member(&self) -> Option<&Member> {
        self.message.member.as_ref()
    }

    fn guild_id(&self) -> Option<&str> {
        self.message.guild_id.as_deref()
    }

    fn channel_id(&self) -> &str {
        &self.message.channel_id
    }

    fn mentions(&self) -> &Mentions {
        &self.message.mentions
    }

    fn attachments(&self) -> &[Attachment] {
        &self.message.attachments
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.message.created_at
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn send(&self, message: OutgoingMessage) -> Result<Message, TransportError> {
        self.transport.send_message(&self.message.channel_id, message).await
    }

    async fn react(&self, emoji: &str) -> Result<(), TransportError> {
        self.transport
            .add_reaction(&self.message.channel_id, &self.message.id, emoji)
            .await
    }
}
