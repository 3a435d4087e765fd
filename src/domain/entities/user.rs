use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents a user account on the messaging platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
    pub is_bot: bool,
    /// Set when the transport only delivered an id without the full user object
    #[serde(default)]
    pub partial: bool,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            global_name: None,
            is_bot: false,
            partial: false,
        }
    }

    pub fn bot(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, username)
        }
    }

    pub fn with_global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Platform-native mention token for this user
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Guild-scoped permissions a member can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    Administrator,
    ManageGuild,
    ManageMessages,
    ManageRoles,
    KickMembers,
    BanMembers,
}

/// A user's membership in a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    pub guild_id: String,
    pub nick: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub partial: bool,
}

impl Member {
    pub fn new(user: User, guild_id: impl Into<String>) -> Self {
        Self {
            user,
            guild_id: guild_id.into(),
            nick: None,
            roles: Vec::new(),
            permissions: Vec::new(),
            partial: false,
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.push(role_id.into());
        self
    }

    /// Administrators implicitly hold every permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| *p == permission || *p == Permission::Administrator)
    }
}
