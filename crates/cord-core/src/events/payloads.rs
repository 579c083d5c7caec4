//! Event payload structures
//!
//! One struct per event type. Entity-carrying events wrap the entity
//! transparently, so `GuildCreate` decodes from a plain guild object.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::entities::{Channel, Emoji, Guild, Interaction, Member, Message, Presence, Role, User, VoiceState};

macro_rules! wrapper_payload {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl Deref for $name {
            type Target = $inner;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

// ============================================================================
// Synthetic events
// ============================================================================

/// Emitted after the gateway connection opens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connect;

/// Emitted after the gateway connection closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disconnect;

/// Body of a 429 response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooManyRequests {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub message: String,
    /// Seconds on the wire, fractional
    #[serde(with = "seconds_f64")]
    pub retry_after: Duration,
    pub global: bool,
}

/// Emitted before the REST layer sleeps on a 429
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    pub too_many_requests: TooManyRequests,
    pub url: String,
}

mod seconds_f64 {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Session events
// ============================================================================

/// Initial state sent after Identify
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ready {
    #[serde(rename = "v")]
    pub version: u32,
    pub session_id: String,
    pub user: User,
    /// Milliseconds; older protocol versions send it here instead of in Hello
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    pub private_channels: Vec<Channel>,
    pub guilds: Vec<Guild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

/// Sent after a successful Resume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resumed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    #[serde(rename = "_trace")]
    pub trace: Vec<String>,
}

// ============================================================================
// Guild events
// ============================================================================

wrapper_payload!(GuildCreate(Guild));
wrapper_payload!(GuildUpdate(Guild));
wrapper_payload!(GuildDelete(Guild));

wrapper_payload!(GuildMemberAdd(Member));
wrapper_payload!(GuildMemberUpdate(Member));
wrapper_payload!(GuildMemberRemove(Member));

/// A batch of members requested through op 8
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildMembersChunk {
    pub guild_id: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildRoleCreate {
    pub guild_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildRoleUpdate {
    pub guild_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildRoleDelete {
    pub guild_id: String,
    pub role_id: String,
}

/// Full replacement of a guild's emoji list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildEmojisUpdate {
    pub guild_id: String,
    pub emojis: Vec<Emoji>,
}

// ============================================================================
// Channel events
// ============================================================================

wrapper_payload!(ChannelCreate(Channel));
wrapper_payload!(ChannelUpdate(Channel));
wrapper_payload!(ChannelDelete(Channel));

// ============================================================================
// Message events
// ============================================================================

wrapper_payload!(MessageCreate(Message));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdate {
    #[serde(flatten)]
    pub message: Message,
    /// Cached copy from before the update, filled by the state cache
    #[serde(skip)]
    pub before_update: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelete {
    #[serde(flatten)]
    pub message: Message,
    /// Cached copy of the deleted message, filled by the state cache
    #[serde(skip)]
    pub before_delete: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDeleteBulk {
    #[serde(rename = "ids")]
    pub messages: Vec<String>,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

// ============================================================================
// Presence and voice events
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    #[serde(flatten)]
    pub presence: Presence,
    #[serde(default)]
    pub guild_id: String,
}

wrapper_payload!(PresencesReplace(Vec<Presence>));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    #[serde(flatten)]
    pub voice_state: VoiceState,
    /// Cached state from before the update, filled by the state cache
    #[serde(skip)]
    pub before_update: Option<VoiceState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceServerUpdate {
    pub token: String,
    pub guild_id: String,
    pub endpoint: String,
}

// ============================================================================
// Misc events
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingStart {
    pub user_id: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    pub timestamp: i64,
}

wrapper_payload!(UserUpdate(User));
wrapper_payload!(InteractionCreate(Interaction));
