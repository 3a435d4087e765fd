//! In-process transport that records everything sent through it

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::application::errors::TransportError;
use crate::application::messaging::SlashCommand;
use crate::domain::entities::{CommandInteraction, Event, Message, OutgoingMessage, Reaction, ReactionFilter, User};
use crate::domain::traits::{EventStream, Transport};

const EVENT_BUFFER: usize = 64;

/// One outbound operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send { channel_id: String, message: OutgoingMessage },
    Edit { channel_id: String, message_id: String, message: OutgoingMessage },
    Delete { channel_id: String, message_id: String },
    InteractionReply { interaction_id: String, message: OutgoingMessage },
    Defer { interaction_id: String },
    EditInteractionReply { interaction_id: String, message: OutgoingMessage },
    AddReaction { channel_id: String, message_id: String, emoji: String },
    RemoveReactions { channel_id: String, message_id: String, emoji: String },
    AddRole { guild_id: String, user_id: String, role_id: String },
    RemoveRole { guild_id: String, user_id: String, role_id: String },
    SetCommands(Vec<SlashCommand>),
}

/// Transport for embedding and tests.
///
/// Events are injected with [`push`](MemoryTransport::push); reactions are
/// queued with [`queue_reaction`](MemoryTransport::queue_reaction) and handed
/// out by `await_reactions`.
pub struct MemoryTransport {
    me: User,
    users: Mutex<HashMap<String, User>>,
    events: Mutex<Option<mpsc::Sender<Event>>>,
    outbound: Mutex<Vec<Outbound>>,
    reactions: Mutex<VecDeque<Reaction>>,
    reaction_added: Notify,
    logins: AtomicUsize,
    destroyed: AtomicBool,
    fail_interaction_reply: AtomicBool,
    fail_login: AtomicBool,
}

impl MemoryTransport {
    pub fn new(me: User) -> Self {
        Self {
            me,
            users: Mutex::new(HashMap::new()),
            events: Mutex::new(None),
            outbound: Mutex::new(Vec::new()),
            reactions: Mutex::new(VecDeque::new()),
            reaction_added: Notify::new(),
            logins: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            fail_interaction_reply: AtomicBool::new(false),
            fail_login: AtomicBool::new(false),
        }
    }

    pub fn cache_user(&self, user: User) {
        lock(&self.users).insert(user.id.clone(), user);
    }

    /// Deliver an event to the logged-in bot
    pub async fn push(&self, event: Event) -> Result<(), TransportError> {
        let sender = lock(&self.events).clone().ok_or(TransportError::Closed)?;
        sender.send(event).await.map_err(|_| TransportError::Closed)
    }

    pub fn queue_reaction(&self, reaction: Reaction) {
        lock(&self.reactions).push_back(reaction);
        self.reaction_added.notify_one();
    }

    /// Make the next interaction reply fail with a network error
    pub fn fail_next_interaction_reply(&self) {
        self.fail_interaction_reply.store(true, Ordering::SeqCst);
    }

    /// Make the next login fail with a network error
    pub fn fail_next_login(&self) {
        self.fail_login.store(true, Ordering::SeqCst);
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        lock(&self.outbound).clone()
    }

    /// Regular messages sent to `channel_id`, oldest first
    pub fn sent_to(&self, channel_id: &str) -> Vec<OutgoingMessage> {
        lock(&self.outbound)
            .iter()
            .filter_map(|op| match op {
                Outbound::Send { channel_id: c, message } if c == channel_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Initial interaction replies, oldest first
    pub fn interaction_replies(&self) -> Vec<OutgoingMessage> {
        lock(&self.outbound)
            .iter()
            .filter_map(|op| match op {
                Outbound::InteractionReply { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn record(&self, op: Outbound) {
        lock(&self.outbound).push(op);
    }

    fn echo(&self, channel_id: &str, message: &OutgoingMessage) -> Message {
        Message::new(channel_id, self.me.clone(), message.content.clone())
    }

    fn take_reactions(&self, channel_id: &str, message_id: &str, filter: &ReactionFilter, max: usize) -> Vec<Reaction> {
        let mut queue = lock(&self.reactions);
        let mut taken = Vec::new();
        let mut kept = VecDeque::new();
        while let Some(reaction) = queue.pop_front() {
            if taken.len() >= max || reaction.channel_id != channel_id || reaction.message_id != message_id {
                kept.push_back(reaction);
            } else if filter.accepts(&reaction) {
                taken.push(reaction);
            }
        }
        *queue = kept;
        taken
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn login(&self, _token: &str) -> Result<EventStream, TransportError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Network("authentication rejected".to_string()));
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *lock(&self.events) = Some(tx);
        Ok(rx)
    }

    fn current_user(&self) -> Option<User> {
        Some(self.me.clone())
    }

    fn cached_user(&self, id: &str) -> Option<User> {
        lock(&self.users).get(id).cloned()
    }

    async fn send_message(&self, channel_id: &str, message: OutgoingMessage) -> Result<Message, TransportError> {
        let sent = self.echo(channel_id, &message);
        self.record(Outbound::Send {
            channel_id: channel_id.to_string(),
            message,
        });
        Ok(sent)
    }

    async fn edit_message(&self, channel_id: &str, message_id: &str, message: OutgoingMessage) -> Result<Message, TransportError> {
        let edited = self.echo(channel_id, &message).with_id(message_id);
        self.record(Outbound::Edit {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            message,
        });
        Ok(edited)
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError> {
        self.record(Outbound::Delete {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn reply_interaction(&self, interaction: &CommandInteraction, message: OutgoingMessage) -> Result<Message, TransportError> {
        if self.fail_interaction_reply.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Network("interaction reply rejected".to_string()));
        }
        let sent = self.echo(&interaction.channel_id, &message);
        self.record(Outbound::InteractionReply {
            interaction_id: interaction.id.clone(),
            message,
        });
        Ok(sent)
    }

    async fn defer_interaction(&self, interaction: &CommandInteraction) -> Result<(), TransportError> {
        self.record(Outbound::Defer {
            interaction_id: interaction.id.clone(),
        });
        Ok(())
    }

    async fn edit_interaction_reply(&self, interaction: &CommandInteraction, message: OutgoingMessage) -> Result<Message, TransportError> {
        let sent = self.echo(&interaction.channel_id, &message);
        self.record(Outbound::EditInteractionReply {
            interaction_id: interaction.id.clone(),
            message,
        });
        Ok(sent)
    }

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), TransportError> {
        self.record(Outbound::AddReaction {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn remove_reactions(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), TransportError> {
        self.record(Outbound::RemoveReactions {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn await_reactions(
        &self,
        channel_id: &str,
        message_id: &str,
        filter: &ReactionFilter,
        max: usize,
        idle: Duration,
    ) -> Result<Vec<Reaction>, TransportError> {
        loop {
            if self.is_destroyed() {
                return Err(TransportError::Closed);
            }
            let taken = self.take_reactions(channel_id, message_id, filter, max);
            if !taken.is_empty() {
                return Ok(taken);
            }
            if tokio::time::timeout(idle, self.reaction_added.notified()).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<(), TransportError> {
        self.record(Outbound::AddRole {
            guild_id: guild_id.to_string(),
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<(), TransportError> {
        self.record(Outbound::RemoveRole {
            guild_id: guild_id.to_string(),
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn set_application_commands(&self, commands: &[SlashCommand]) -> Result<(), TransportError> {
        self.record(Outbound::SetCommands(commands.to_vec()));
        Ok(())
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.destroyed.store(true, Ordering::SeqCst);
        lock(&self.events).take();
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
