//! Makes a slash-command interaction usable wherever a text message is

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::Value;
use tokio::sync::Mutex;

use super::context::CommandContext;
use crate::application::errors::TransportError;
use crate::domain::entities::{
    Attachment, CommandInteraction, CommandOption, Member, Mentions, Message, OptionKind, OutgoingMessage, Resolved, User,
};
use crate::domain::traits::Transport;

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?(\d+)>").expect("valid user mention pattern"));
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@&(\d+)>").expect("valid role mention pattern"));
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<#(\d+)>").expect("valid channel mention pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Pending,
    Deferred,
    Replied,
}

/// Context for a command invoked by a slash-command interaction.
///
/// The first response uses the platform's one-shot interaction reply; every
/// later one is a regular channel message.
pub struct InteractionContext {
    interaction: CommandInteraction,
    content: String,
    mentions: Mentions,
    transport: Arc<dyn Transport>,
    state: Mutex<ReplyState>,
    reply: Mutex<Option<Message>>,
}

impl InteractionContext {
    pub fn new(interaction: CommandInteraction, transport: Arc<dyn Transport>) -> Self {
        let content = content_from_options(&interaction.options, &interaction.resolved);
        let mentions = mentions_from_content(&content, &interaction.resolved, transport.as_ref());
        Self {
            interaction,
            content,
            mentions,
            transport,
            state: Mutex::new(ReplyState::Pending),
            reply: Mutex::new(None),
        }
    }

    /// Acknowledge the interaction now and reply later
    pub async fn defer(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if *state == ReplyState::Pending {
            self.transport.defer_interaction(&self.interaction).await?;
            *state = ReplyState::Deferred;
        }
        Ok(())
    }

    pub async fn replied(&self) -> bool {
        *self.state.lock().await == ReplyState::Replied
    }
}

#[async_trait]
impl CommandContext for InteractionContext {
    fn id(&self) -> &str {
        &self.interaction.id
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn author(&self) -> &User {
        &self.interaction.user
    }

    fn member(&self) -> Option<&Member> {
        self.interaction.member.as_ref()
    }

    fn guild_id(&self) -> Option<&str> {
        self.interaction.guild_id.as_deref()
    }

    fn channel_id(&self) -> &str {
        &self.interaction.channel_id
    }

    fn mentions(&self) -> &Mentions {
        &self.mentions
    }

    fn attachments(&self) -> &[Attachment] {
        &[]
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.interaction.created_at
    }

    fn interaction(&self) -> Option<&CommandInteraction> {
        Some(&self.interaction)
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn send(&self, message: OutgoingMessage) -> Result<Message, TransportError> {
        // Held across the call so concurrent sends cannot both take the initial reply.
        let mut state = self.state.lock().await;
        let sent = match *state {
            ReplyState::Pending => self.transport.reply_interaction(&self.interaction, message).await?,
            ReplyState::Deferred => self.transport.edit_interaction_reply(&self.interaction, message).await?,
            ReplyState::Replied => {
                return self
                    .transport
                    .send_message(&self.interaction.channel_id, message)
                    .await;
            }
        };
        *state = ReplyState::Replied;
        *self.reply.lock().await = Some(sent.clone());
        Ok(sent)
    }

    async fn react(&self, emoji: &str) -> Result<(), TransportError> {
        let reply = self.reply.lock().await.clone();
        match reply {
            Some(message) => {
                self.transport
                    .add_reaction(&message.channel_id, &message.id, emoji)
                    .await
            }
            None => Err(TransportError::Unsupported("reacting before the interaction reply")),
        }
    }
}

/// Rebuild text-command content from structured options
pub fn content_from_options(options: &[CommandOption], resolved: &Resolved) -> String {
    options
        .iter()
        .map(|option| option_to_string(option, resolved))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn option_to_string(option: &CommandOption, resolved: &Resolved) -> String {
    let value = option.value.as_ref().map(value_to_string).unwrap_or_default();
    match option.kind {
        OptionKind::SubCommand | OptionKind::SubCommandGroup => {
            let inner = content_from_options(&option.options, resolved);
            if inner.is_empty() {
                option.name.clone()
            } else {
                format!("{} {}", option.name, inner)
            }
        }
        OptionKind::User => format!("<@{}>", value),
        OptionKind::Channel => format!("<#{}>", value),
        OptionKind::Role => format!("<@&{}>", value),
        OptionKind::Mentionable if resolved.roles.contains(&value) => format!("<@&{}>", value),
        OptionKind::Mentionable => format!("<@{}>", value),
        _ => value,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Best-effort mentions for synthesized content
fn mentions_from_content(content: &str, resolved: &Resolved, transport: &dyn Transport) -> Mentions {
    let mut mentions = Mentions::default();
    for captures in USER_MENTION.captures_iter(content) {
        let id = &captures[1];
        if mentions.users.iter().any(|u| u.id == id) {
            continue;
        }
        if let Some(user) = transport.cached_user(id).or_else(|| resolved.users.get(id).cloned()) {
            mentions.users.push(user);
        }
    }
    for captures in ROLE_MENTION.captures_iter(content) {
        let id = captures[1].to_string();
        if !mentions.roles.contains(&id) {
            mentions.roles.push(id);
        }
    }
    for captures in CHANNEL_MENTION.captures_iter(content) {
        let id = captures[1].to_string();
        if !mentions.channels.contains(&id) {
            mentions.channels.push(id);
        }
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::memory::{MemoryTransport, Outbound};
    use serde_json::json;

    fn transport() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::new(User::bot("100", "twink")))
    }

    #[test]
    fn test_content_from_nested_options() {
        let resolved = Resolved {
            roles: vec!["77".to_string()],
            ..Resolved::default()
        };
        let options = vec![CommandOption::group(
            "role",
            vec![CommandOption::sub_command(
                "give",
                vec![
                    CommandOption::new("user", OptionKind::User, "42"),
                    CommandOption::new("role", OptionKind::Role, "77"),
                    CommandOption::new("where", OptionKind::Channel, "9"),
                    CommandOption::new("who", OptionKind::Mentionable, "77"),
                    CommandOption::new("also", OptionKind::Mentionable, "43"),
                    CommandOption::new("days", OptionKind::Integer, json!(3)),
                    CommandOption::new("silent", OptionKind::Boolean, json!(true)),
                    CommandOption::new("reason", OptionKind::String, "spam links"),
                ],
            )],
        )];

        assert_eq!(
            content_from_options(&options, &resolved),
            "role give <@42> <@&77> <#9> <@&77> <@43> 3 true spam links"
        );
        assert_eq!(
            content_from_options(&[CommandOption::sub_command("list", vec![])], &resolved),
            "list"
        );
    }

    #[test]
    fn test_mentions_resolve_from_cache() {
        let transport = transport();
        transport.cache_user(User::new("42", "alice"));
        let interaction = CommandInteraction::new("ban", "c", User::new("1", "mod"))
            .with_option(CommandOption::new("user", OptionKind::User, "42"))
            .with_option(CommandOption::new("unknown", OptionKind::User, "404"));

        let ctx = InteractionContext::new(interaction, transport);
        assert_eq!(ctx.content(), "<@42> <@404>");
        assert_eq!(ctx.mentions().users.len(), 1);
        assert_eq!(ctx.mentions().users[0].username, "alice");
    }

    #[tokio::test]
    async fn test_first_send_replies_then_posts_to_channel() {
        let transport = transport();
        let interaction = CommandInteraction::new("ping", "chan", User::new("1", "alice"));
        let ctx = InteractionContext::new(interaction, transport.clone());

        ctx.send("one".into()).await.unwrap();
        assert!(ctx.replied().await);
        ctx.send("two".into()).await.unwrap();

        assert_eq!(transport.interaction_replies().len(), 1);
        assert_eq!(transport.interaction_replies()[0].content, "one");
        assert_eq!(transport.sent_to("chan")[0].content, "two");
    }

    #[tokio::test]
    async fn test_failed_initial_reply_can_be_retried() {
        let transport = transport();
        transport.fail_next_interaction_reply();
        let interaction = CommandInteraction::new("ping", "chan", User::new("1", "alice"));
        let ctx = InteractionContext::new(interaction, transport.clone());

        assert!(ctx.send("first".into()).await.is_err());
        assert!(!ctx.replied().await);

        ctx.send("retry".into()).await.unwrap();
        assert_eq!(transport.interaction_replies()[0].content, "retry");
        assert!(transport.sent_to("chan").is_empty());
    }

    #[tokio::test]
    async fn test_deferred_reply_edits_the_response() {
        let transport = transport();
        let interaction = CommandInteraction::new("slow", "chan", User::new("1", "alice"));
        let ctx = InteractionContext::new(interaction, transport.clone());

        ctx.defer().await.unwrap();
        ctx.send("done".into()).await.unwrap();

        let outbound = transport.outbound();
        assert!(matches!(outbound[0], Outbound::Defer { .. }));
        assert!(matches!(&outbound[1], Outbound::EditInteractionReply { message, .. } if message.content == "done"));
        assert!(transport.interaction_replies().is_empty());
    }
}
