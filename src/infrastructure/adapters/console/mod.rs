//! Console adapter for development/testing

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::errors::TransportError;
use crate::application::messaging::SlashCommand;
use crate::domain::entities::{
    CommandInteraction, Event, Member, Message, OutgoingMessage, Permission, Reaction, ReactionFilter, User,
};
use crate::domain::traits::{EventStream, Transport};

/// Guild and channel every console message arrives in
pub const CONSOLE_CHANNEL: &str = "console";

/// Console transport for local development.
///
/// Each stdin line arrives as a message from an administrator of the
/// console guild. Everything the bot sends is printed to stdout.
pub struct ConsoleTransport {
    me: User,
    operator: User,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            me: User::bot("console-bot", "twink-bot"),
            operator: User::new("console-user", "console"),
            reader: Mutex::new(None),
        }
    }

    pub fn operator(&self) -> &User {
        &self.operator
    }

    fn message_from(&self, line: String) -> Message {
        let member = Member::new(self.operator.clone(), CONSOLE_CHANNEL).with_permission(Permission::Administrator);
        Message::new(CONSOLE_CHANNEL, self.operator.clone(), line).with_member(member)
    }

    fn print(&self, message: &OutgoingMessage) -> Message {
        println!("[BOT] {}", message.content);
        Message::new(CONSOLE_CHANNEL, self.me.clone(), message.content.clone())
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn login(&self, _token: &str) -> Result<EventStream, TransportError> {
        tracing::info!("Starting console transport (dev mode)");
        let (tx, rx) = mpsc::channel(16);
        tx.send(Event::Ready).await.map_err(|_| TransportError::Closed)?;

        let template = self.message_from(String::new());
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let message = Message {
                    id: uuid::Uuid::new_v4().to_string(),
                    content: line,
                    created_at: chrono::Utc::now(),
                    ..template.clone()
                };
                if tx.send(Event::MessageCreate(message)).await.is_err() {
                    break;
                }
            }
        });
        *self.reader.lock().unwrap_or_else(|e| e.into_inner()) = Some(reader);
        Ok(rx)
    }

    fn current_user(&self) -> Option<User> {
        Some(self.me.clone())
    }

    fn cached_user(&self, id: &str) -> Option<User> {
        [&self.me, &self.operator]
            .into_iter()
            .find(|u| u.id == id)
            .cloned()
    }

    async fn send_message(&self, _channel_id: &str, message: OutgoingMessage) -> Result<Message, TransportError> {
        Ok(self.print(&message))
    }

    async fn edit_message(&self, _channel_id: &str, message_id: &str, message: OutgoingMessage) -> Result<Message, TransportError> {
        println!("[BOT edited {}] {}", message_id, message.content);
        Ok(Message::new(CONSOLE_CHANNEL, self.me.clone(), message.content).with_id(message_id))
    }

    async fn delete_message(&self, _channel_id: &str, message_id: &str) -> Result<(), TransportError> {
        println!("[BOT deleted {}]", message_id);
        Ok(())
    }

    async fn reply_interaction(&self, _interaction: &CommandInteraction, message: OutgoingMessage) -> Result<Message, TransportError> {
        Ok(self.print(&message))
    }

    async fn defer_interaction(&self, _interaction: &CommandInteraction) -> Result<(), TransportError> {
        Ok(())
    }

    async fn edit_interaction_reply(&self, _interaction: &CommandInteraction, message: OutgoingMessage) -> Result<Message, TransportError> {
        Ok(self.print(&message))
    }

    async fn add_reaction(&self, _channel_id: &str, _message_id: &str, emoji: &str) -> Result<(), TransportError> {
        println!("[BOT reacted] {}", emoji);
        Ok(())
    }

    async fn remove_reactions(&self, _channel_id: &str, _message_id: &str, _emoji: &str) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("removing reactions"))
    }

    async fn await_reactions(
        &self,
        _channel_id: &str,
        _message_id: &str,
        _filter: &ReactionFilter,
        _max: usize,
        idle: Duration,
    ) -> Result<Vec<Reaction>, TransportError> {
        // Nobody can react from a terminal.
        tokio::time::sleep(idle).await;
        Ok(Vec::new())
    }

    async fn add_role(&self, _guild_id: &str, _user_id: &str, _role_id: &str) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("roles"))
    }

    async fn remove_role(&self, _guild_id: &str, _user_id: &str, _role_id: &str) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("roles"))
    }

    async fn set_application_commands(&self, _commands: &[SlashCommand]) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("slash commands"))
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        if let Some(reader) = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take() {
            reader.abort();
        }
        Ok(())
    }
}
