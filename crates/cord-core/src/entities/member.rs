//! Guild member entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// A user's membership in a guild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub guild_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    pub deaf: bool,
    pub mute: bool,
    pub user: User,
    /// Role ids, not including @everyone
    pub roles: Vec<String>,
}

impl Member {
    /// Create a new member
    pub fn new(guild_id: impl Into<String>, user: User) -> Self {
        Self {
            guild_id: guild_id.into(),
            user,
            ..Self::default()
        }
    }

    /// Shorthand for the member's user id
    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Nickname if set, username otherwise
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.user.username)
    }

    /// Check if the member holds a role
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }
}
