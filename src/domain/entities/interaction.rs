use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Member, User};

/// Type of a slash-command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

/// One option supplied with a slash-command interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub kind: OptionKind,
    /// Absent for sub-commands and groups
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

impl CommandOption {
    pub fn new(name: impl Into<String>, kind: OptionKind, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Some(value.into()),
            options: Vec::new(),
        }
    }

    pub fn sub_command(name: impl Into<String>, options: Vec<CommandOption>) -> Self {
        Self {
            name: name.into(),
            kind: OptionKind::SubCommand,
            value: None,
            options,
        }
    }

    pub fn group(name: impl Into<String>, options: Vec<CommandOption>) -> Self {
        Self {
            kind: OptionKind::SubCommandGroup,
            ..Self::sub_command(name, options)
        }
    }
}

/// Objects the platform resolved for the option ids of an interaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
    pub users: HashMap<String, User>,
    pub roles: Vec<String>,
    pub channels: Vec<String>,
}

/// A slash-command invocation delivered by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInteraction {
    pub id: String,
    /// One-shot token the platform requires for the initial reply
    pub token: String,
    pub command_name: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub user: User,
    pub member: Option<Member>,
    pub options: Vec<CommandOption>,
    pub resolved: Resolved,
    pub created_at: DateTime<Utc>,
}

impl CommandInteraction {
    pub fn new(command_name: impl Into<String>, channel_id: impl Into<String>, user: User) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            command_name: command_name.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            user,
            member: None,
            options: Vec::new(),
            resolved: Resolved::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.guild_id = Some(member.guild_id.clone());
        self.member = Some(member);
        self
    }

    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_resolved(mut self, resolved: Resolved) -> Self {
        self.resolved = resolved;
        self
    }

    pub fn has_partial(&self) -> bool {
        self.user.partial || self.member.as_ref().is_some_and(|m| m.partial)
    }
}
