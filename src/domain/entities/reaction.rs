use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::User;

/// A reaction added to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub channel_id: String,
    pub message_id: String,
    pub emoji: String,
    pub user: User,
    #[serde(default)]
    pub partial: bool,
}

impl Reaction {
    pub fn new(
        channel_id: impl Into<String>,
        message_id: impl Into<String>,
        emoji: impl Into<String>,
        user: User,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            emoji: emoji.into(),
            user,
            partial: false,
        }
    }

    pub fn has_partial(&self) -> bool {
        self.partial || self.user.partial
    }
}

/// Which reactions a collector accepts
#[derive(Debug, Clone, Default)]
pub struct ReactionFilter {
    /// Accepted emoji; empty accepts any
    pub emojis: HashSet<String>,
    /// Accepted reactors; empty accepts anyone
    pub users: HashSet<String>,
    /// Reactor that is always rejected, normally the bot itself
    pub exclude_user: Option<String>,
}

impl ReactionFilter {
    pub fn accepts(&self, reaction: &Reaction) -> bool {
        if self.exclude_user.as_deref() == Some(reaction.user.id.as_str()) {
            return false;
        }
        if !self.emojis.is_empty() && !self.emojis.contains(&reaction.emoji) {
            return false;
        }
        self.users.is_empty() || self.users.contains(&reaction.user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rejects_excluded_user_and_unknown_emoji() {
        let filter = ReactionFilter {
            emojis: ["👍".to_string()].into_iter().collect(),
            users: HashSet::new(),
            exclude_user: Some("bot".to_string()),
        };

        assert!(filter.accepts(&Reaction::new("c", "m", "👍", User::new("1", "a"))));
        assert!(!filter.accepts(&Reaction::new("c", "m", "👎", User::new("1", "a"))));
        assert!(!filter.accepts(&Reaction::new("c", "m", "👍", User::bot("bot", "me"))));
    }

    #[test]
    fn test_filter_allow_list() {
        let filter = ReactionFilter {
            users: ["1".to_string()].into_iter().collect(),
            ..ReactionFilter::default()
        };
        assert!(filter.accepts(&Reaction::new("c", "m", "x", User::new("1", "a"))));
        assert!(!filter.accepts(&Reaction::new("c", "m", "x", User::new("2", "b"))));
    }
}
