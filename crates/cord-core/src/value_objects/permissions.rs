//! Permission bitflags
//!
//! Bit positions follow the platform's published layout. Serialized as a
//! decimal string, deserialized from either a string or a number since older
//! API versions send raw integers.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::DomainError;

bitflags! {
    /// Guild and channel permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        // General
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS          = 1 << 1;
        const BAN_MEMBERS           = 1 << 2;
        /// Bypasses every channel overwrite
        const ADMINISTRATOR         = 1 << 3;
        const MANAGE_CHANNELS       = 1 << 4;
        const MANAGE_GUILD          = 1 << 5;
        const ADD_REACTIONS         = 1 << 6;
        const VIEW_AUDIT_LOG        = 1 << 7;
        const PRIORITY_SPEAKER      = 1 << 8;

        // Text
        const VIEW_CHANNEL          = 1 << 10;
        const SEND_MESSAGES         = 1 << 11;
        const SEND_TTS_MESSAGES     = 1 << 12;
        const MANAGE_MESSAGES       = 1 << 13;
        const EMBED_LINKS           = 1 << 14;
        const ATTACH_FILES          = 1 << 15;
        const READ_MESSAGE_HISTORY  = 1 << 16;
        const MENTION_EVERYONE      = 1 << 17;
        const USE_EXTERNAL_EMOJIS   = 1 << 18;

        // Voice
        const CONNECT               = 1 << 20;
        const SPEAK                 = 1 << 21;
        const MUTE_MEMBERS          = 1 << 22;
        const DEAFEN_MEMBERS        = 1 << 23;
        const MOVE_MEMBERS          = 1 << 24;
        const USE_VAD               = 1 << 25;

        // Management
        const CHANGE_NICKNAME       = 1 << 26;
        const MANAGE_NICKNAMES      = 1 << 27;
        const MANAGE_ROLES          = 1 << 28;
        const MANAGE_WEBHOOKS       = 1 << 29;
        const MANAGE_EMOJIS         = 1 << 30;

        /// Every permission that applies to text channels
        const ALL_TEXT = Self::VIEW_CHANNEL.bits()
            | Self::SEND_MESSAGES.bits()
            | Self::SEND_TTS_MESSAGES.bits()
            | Self::MANAGE_MESSAGES.bits()
            | Self::EMBED_LINKS.bits()
            | Self::ATTACH_FILES.bits()
            | Self::READ_MESSAGE_HISTORY.bits()
            | Self::MENTION_EVERYONE.bits();

        /// Every permission that applies to voice channels
        const ALL_VOICE = Self::VIEW_CHANNEL.bits()
            | Self::CONNECT.bits()
            | Self::SPEAK.bits()
            | Self::MUTE_MEMBERS.bits()
            | Self::DEAFEN_MEMBERS.bits()
            | Self::MOVE_MEMBERS.bits()
            | Self::USE_VAD.bits()
            | Self::PRIORITY_SPEAKER.bits();

        /// Every permission a channel overwrite can carry
        const ALL_CHANNEL = Self::ALL_TEXT.bits()
            | Self::ALL_VOICE.bits()
            | Self::CREATE_INSTANT_INVITE.bits()
            | Self::MANAGE_ROLES.bits()
            | Self::MANAGE_CHANNELS.bits()
            | Self::ADD_REACTIONS.bits()
            | Self::VIEW_AUDIT_LOG.bits();

        /// All permissions (guild owners)
        const ALL = Self::ALL_CHANNEL.bits()
            | Self::KICK_MEMBERS.bits()
            | Self::BAN_MEMBERS.bits()
            | Self::MANAGE_GUILD.bits()
            | Self::ADMINISTRATOR.bits()
            | Self::MANAGE_WEBHOOKS.bits()
            | Self::MANAGE_EMOJIS.bits();
    }
}

impl Permissions {
    /// Check if the permission set contains a required permission
    ///
    /// Administrators bypass all permission checks.
    #[inline]
    pub fn has(&self, permission: Permissions) -> bool {
        if self.contains(Permissions::ADMINISTRATOR) {
            return true;
        }
        self.contains(permission)
    }

    /// Check if the permission set has any of the given permissions
    #[inline]
    pub fn has_any(&self, permissions: Permissions) -> bool {
        if self.contains(Permissions::ADMINISTRATOR) {
            return true;
        }
        self.intersects(permissions)
    }

    /// Combine permissions from multiple roles
    pub fn combine<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Permissions>,
    {
        roles.into_iter().fold(Permissions::empty(), |acc, p| acc | p)
    }

    /// Revoke `deny`, then grant `allow`
    #[inline]
    #[must_use]
    pub fn overwrite(self, deny: Permissions, allow: Permissions) -> Self {
        (self & !deny) | allow
    }

    /// Parse from string representation (decimal number)
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        s.parse::<u64>()
            .map(Permissions::from_bits_truncate)
            .map_err(|_| DomainError::InvalidPermissions(s.to_string()))
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::empty()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.bits().to_string())
    }
}

// Deserialize from string or number
impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct PermissionsVisitor;

        impl Visitor<'_> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing permission bits")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Ok(Permissions::from_bits_truncate(value as u64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Ok(Permissions::from_bits_truncate(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Permissions::parse(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

impl From<u64> for Permissions {
    fn from(bits: u64) -> Self {
        Permissions::from_bits_truncate(bits)
    }
}

impl From<Permissions> for u64 {
    fn from(perms: Permissions) -> Self {
        perms.bits()
    }
}
