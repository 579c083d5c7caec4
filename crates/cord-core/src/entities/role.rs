//! Role entity - a guild role with permissions

use serde::{Deserialize, Serialize};

use crate::value_objects::Permissions;

/// Role entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub managed: bool,
    pub mentionable: bool,
    pub hoist: bool,
    pub color: i32,
    pub position: i32,
    pub permissions: Permissions,
}

impl Role {
    /// Create a new Role
    pub fn new(id: impl Into<String>, name: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions,
            ..Self::default()
        }
    }

    /// The @everyone role shares its id with the guild
    #[inline]
    pub fn is_everyone(&self, guild_id: &str) -> bool {
        self.id == guild_id
    }

    /// Mention string (`<@&id>`)
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }

    /// Compare role positions for hierarchy (higher position = more authority)
    #[inline]
    pub fn is_higher_than(&self, other: &Role) -> bool {
        self.position > other.position
    }
}
