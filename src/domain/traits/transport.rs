use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::application::messaging::SlashCommand;
use crate::domain::entities::{CommandInteraction, Event, Message, OutgoingMessage, Reaction, ReactionFilter, User};

/// Stream of events produced by a logged-in transport
pub type EventStream = mpsc::Receiver<Event>;

/// Transport trait - abstraction for the real-time messaging platform client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticate and open the connection; events arrive on the returned stream
    async fn login(&self, token: &str) -> Result<EventStream, TransportError>;

    /// The bot's own account, known once logged in
    fn current_user(&self) -> Option<User>;

    /// Look up a user in the transport's local cache
    fn cached_user(&self, id: &str) -> Option<User>;

    /// Send a regular message to a channel
    async fn send_message(&self, channel_id: &str, message: OutgoingMessage) -> Result<Message, TransportError>;

    /// Edit a previously sent message
    async fn edit_message(&self, channel_id: &str, message_id: &str, message: OutgoingMessage) -> Result<Message, TransportError>;

    /// Delete a message
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError>;

    /// The one-shot initial reply to an interaction
    async fn reply_interaction(&self, interaction: &CommandInteraction, message: OutgoingMessage) -> Result<Message, TransportError>;

    /// Acknowledge an interaction so the reply can come later
    async fn defer_interaction(&self, interaction: &CommandInteraction) -> Result<(), TransportError>;

    /// Fill in the response of a deferred interaction
    async fn edit_interaction_reply(&self, interaction: &CommandInteraction, message: OutgoingMessage) -> Result<Message, TransportError>;

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), TransportError>;

    /// Remove every reaction of one emoji from a message
    async fn remove_reactions(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), TransportError>;

    /// Wait for up to `max` reactions matching `filter`, giving up after `idle` without one
    async fn await_reactions(
        &self,
        channel_id: &str,
        message_id: &str,
        filter: &ReactionFilter,
        max: usize,
        idle: Duration,
    ) -> Result<Vec<Reaction>, TransportError>;

    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<(), TransportError>;

    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<(), TransportError>;

    /// Replace the platform's registered slash-command schemas
    async fn set_application_commands(&self, commands: &[SlashCommand]) -> Result<(), TransportError>;

    /// Tear down the connection
    async fn destroy(&self) -> Result<(), TransportError>;
}
