//! Channel entity - guild text/voice channels, categories, and private DMs

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{Message, User};
use crate::value_objects::Permissions;

/// Channel type, carried as an integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    #[default]
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildNews,
    GuildStore,
    Unknown(u8),
}

impl ChannelType {
    /// Direct message or group direct message
    #[inline]
    pub fn is_private(self) -> bool {
        matches!(self, Self::Dm | Self::GroupDm)
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildNews,
            6 => Self::GuildStore,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(ct: ChannelType) -> Self {
        match ct {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildNews => 5,
            ChannelType::GuildStore => 6,
            ChannelType::Unknown(other) => other,
        }
    }
}

/// Target of a permission overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverwriteType {
    #[default]
    Role,
    Member,
}

impl OverwriteType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Member => "member",
        }
    }
}

impl Serialize for OverwriteType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// Older API versions send "role"/"member", newer ones 0/1
impl<'de> Deserialize<'de> for OverwriteType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct OverwriteTypeVisitor;

        impl Visitor<'_> for OverwriteTypeVisitor {
            type Value = OverwriteType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("\"role\", \"member\", 0 or 1")
            }

            fn visit_u64<E>(self, value: u64) -> Result<OverwriteType, E>
            where
                E: de::Error,
            {
                match value {
                    0 => Ok(OverwriteType::Role),
                    1 => Ok(OverwriteType::Member),
                    other => Err(E::custom(format!("unknown overwrite type {other}"))),
                }
            }

            fn visit_i64<E>(self, value: i64) -> Result<OverwriteType, E>
            where
                E: de::Error,
            {
                self.visit_u64(value as u64)
            }

            fn visit_str<E>(self, value: &str) -> Result<OverwriteType, E>
            where
                E: de::Error,
            {
                match value {
                    "role" => Ok(OverwriteType::Role),
                    "member" => Ok(OverwriteType::Member),
                    other => Err(E::custom(format!("unknown overwrite type {other}"))),
                }
            }
        }

        deserializer.deserialize_any(OverwriteTypeVisitor)
    }
}

/// Channel-level permission overwrite for a role or a member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverwriteType,
    pub allow: Permissions,
    pub deny: Permissions,
}

/// Channel entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
    pub nsfw: bool,
    pub position: i32,
    pub bitrate: u32,
    pub recipients: Vec<User>,
    pub permission_overwrites: Vec<PermissionOverwrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Cached messages, oldest first. Never on the wire.
    #[serde(skip)]
    pub messages: Vec<Message>,
}

impl Channel {
    /// Create a guild channel
    pub fn guild(id: impl Into<String>, guild_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            guild_id: Some(guild_id.into()),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a direct message channel
    pub fn dm(id: impl Into<String>, recipient: User) -> Self {
        Self {
            id: id.into(),
            kind: ChannelType::Dm,
            recipients: vec![recipient],
            ..Self::default()
        }
    }

    /// Mention string (`<#id>`)
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }

    /// Overwrite targeting the given role or member id
    pub fn overwrite_for(&self, kind: OverwriteType, id: &str) -> Option<&PermissionOverwrite> {
        self.permission_overwrites
            .iter()
            .find(|o| o.kind == kind && o.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_from_u8() {
        assert_eq!(ChannelType::from(0), ChannelType::GuildText);
        assert_eq!(ChannelType::from(3), ChannelType::GroupDm);
        assert_eq!(ChannelType::from(42), ChannelType::Unknown(42));
        assert_eq!(u8::from(ChannelType::Unknown(42)), 42);
    }

    #[test]
    fn test_private_types() {
        assert!(ChannelType::Dm.is_private());
        assert!(ChannelType::GroupDm.is_private());
        assert!(!ChannelType::GuildVoice.is_private());
    }

    #[test]
    fn test_deserialize_channel() {
        let json = r#"{
            "id": "10",
            "guild_id": "1",
            "name": "general",
            "type": 0,
            "permission_overwrites": [
                {"id": "1", "type": "role", "allow": 0, "deny": 2048},
                {"id": "99", "type": 1, "allow": "2048", "deny": "0"}
            ]
        }"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.kind, ChannelType::GuildText);
        assert_eq!(channel.guild_id.as_deref(), Some("1"));
        assert_eq!(channel.permission_overwrites.len(), 2);

        let member = channel.overwrite_for(OverwriteType::Member, "99").unwrap();
        assert_eq!(member.allow, Permissions::SEND_MESSAGES);
        let role = channel.overwrite_for(OverwriteType::Role, "1").unwrap();
        assert_eq!(role.deny, Permissions::SEND_MESSAGES);
    }

    #[test]
    fn test_messages_not_serialized() {
        let mut channel = Channel::guild("10", "1", "general");
        channel.messages.push(Message::default());
        let value = serde_json::to_value(&channel).unwrap();
        assert!(value.get("messages").is_none());
        assert_eq!(value["type"], 0);
    }

    #[test]
    fn test_unknown_overwrite_type_rejected() {
        let result: Result<OverwriteType, _> = serde_json::from_str("\"channel\"");
        assert!(result.is_err());
    }
}
