use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Member, User};

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// Entities mentioned by a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentions {
    pub users: Vec<User>,
    pub roles: Vec<String>,
    pub channels: Vec<String>,
    pub everyone: bool,
}

/// Represents a text message received from, or sent through, the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub author: User,
    pub member: Option<Member>,
    pub content: String,
    pub mentions: Mentions,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// Set when the transport delivered the message without hydrating it
    #[serde(default)]
    pub partial: bool,
}

impl Message {
    pub fn new(channel_id: impl Into<String>, author: User, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            guild_id: None,
            author,
            member: None,
            content: content.into(),
            mentions: Mentions::default(),
            attachments: Vec::new(),
            created_at: Utc::now(),
            edited_at: None,
            partial: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.guild_id = Some(member.guild_id.clone());
        self.member = Some(member);
        self
    }

    pub fn with_mentions(mut self, mentions: Mentions) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn as_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Whether this message or anything it embeds is incompletely hydrated
    pub fn has_partial(&self) -> bool {
        self.partial
            || self.author.partial
            || self.member.as_ref().is_some_and(|m| m.partial)
    }
}

/// Outgoing message payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    /// Only honoured by interaction replies
    pub ephemeral: bool,
    /// Suppress mention pings in the rendered message
    pub suppress_mentions: bool,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn without_mentions(mut self) -> Self {
        self.suppress_mentions = true;
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for OutgoingMessage {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}
