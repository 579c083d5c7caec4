//! Guild entity - a server with its channels, roles, and members

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Channel, Emoji, Member, Presence, Role, VoiceState};

/// Guild entity
///
/// Sub-collections are only populated on `GUILD_CREATE`; update payloads
/// leave them empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    pub large: bool,
    pub unavailable: bool,
    pub member_count: u32,
    pub roles: Vec<Role>,
    pub emojis: Vec<Emoji>,
    pub members: Vec<Member>,
    pub presences: Vec<Presence>,
    pub channels: Vec<Channel>,
    pub voice_states: Vec<VoiceState>,
}

impl Guild {
    /// Create a new Guild
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    /// Check if a user is the owner of this guild
    #[inline]
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// The @everyone role
    pub fn everyone_role(&self) -> Option<&Role> {
        self.roles.iter().find(|r| r.is_everyone(&self.id))
    }

    /// Look up a role by id
    pub fn role(&self, role_id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }

    /// Stamp this guild's id on nested channels and members
    pub fn assign_ids(&mut self) {
        for channel in &mut self.channels {
            channel.guild_id = Some(self.id.clone());
        }
        for member in &mut self.members {
            member.guild_id.clone_from(&self.id);
        }
    }
}
