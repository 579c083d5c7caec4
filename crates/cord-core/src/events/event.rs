//! The event tagged union
//!
//! Every gateway dispatch type and every client-generated notification is a
//! variant of [`Event`]. The textual `t` field of a dispatch frame maps to a
//! variant through [`EventKind::from_wire_name`]; unknown names decode to
//! `None` and are dropped by the caller.

use serde_json::Value;
use std::fmt;

use super::payloads::*;
use crate::error::DomainError;

/// Implemented by every event payload, linking it to its [`EventKind`]
pub trait EventPayload: Clone + Send + Sync + 'static {
    const KIND: EventKind;

    /// Borrow this payload out of an event of the matching kind
    fn from_event(event: &Event) -> Option<&Self>;
}

macro_rules! events {
    (
        synthetic { $($syn:ident),* $(,)? }
        dispatch { $($wire_variant:ident => $wire:literal),* $(,)? }
    ) => {
        /// A decoded gateway event or a client-generated notification
        #[derive(Debug, Clone)]
        pub enum Event {
            $($syn($syn),)*
            $($wire_variant(Box<$wire_variant>),)*
        }

        /// Discriminant of [`Event`], used as the handler registry key
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($syn,)*
            $($wire_variant,)*
        }

        impl EventKind {
            /// Every kind, synthetic ones first
            pub const ALL: &'static [EventKind] = &[
                $(EventKind::$syn,)*
                $(EventKind::$wire_variant,)*
            ];

            /// Dispatch `t` value, `None` for client-generated events
            pub fn wire_name(self) -> Option<&'static str> {
                match self {
                    $(Self::$syn => None,)*
                    $(Self::$wire_variant => Some($wire),)*
                }
            }

            /// Resolve a dispatch `t` value
            pub fn from_wire_name(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$wire_variant),)*
                    _ => None,
                }
            }

            /// Variant name, for logs
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$syn => stringify!($syn),)*
                    $(Self::$wire_variant => stringify!($wire_variant),)*
                }
            }
        }

        impl Event {
            /// Kind of this event
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Self::$syn(_) => EventKind::$syn,)*
                    $(Self::$wire_variant(_) => EventKind::$wire_variant,)*
                }
            }

            /// Decode the `d` payload of a dispatch frame of type `t`
            ///
            /// Returns `Ok(None)` when `t` names no known event.
            pub fn decode(event_type: &str, data: Value) -> Result<Option<Self>, DomainError> {
                match event_type {
                    $($wire => serde_json::from_value::<$wire_variant>(data)
                        .map(|payload| Some(Self::$wire_variant(Box::new(payload))))
                        .map_err(|source| DomainError::EventDecode { event: $wire, source }),)*
                    _ => Ok(None),
                }
            }
        }

        $(
            impl EventPayload for $syn {
                const KIND: EventKind = EventKind::$syn;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$syn(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$syn> for Event {
                fn from(payload: $syn) -> Self {
                    Event::$syn(payload)
                }
            }
        )*

        $(
            impl EventPayload for $wire_variant {
                const KIND: EventKind = EventKind::$wire_variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$wire_variant(payload) => Some(&**payload),
                        _ => None,
                    }
                }
            }

            impl From<$wire_variant> for Event {
                fn from(payload: $wire_variant) -> Self {
                    Event::$wire_variant(Box::new(payload))
                }
            }
        )*
    };
}

events! {
    synthetic {
        Connect,
        Disconnect,
        RateLimit,
    }
    dispatch {
        Ready => "READY",
        Resumed => "RESUMED",
        GuildCreate => "GUILD_CREATE",
        GuildUpdate => "GUILD_UPDATE",
        GuildDelete => "GUILD_DELETE",
        GuildMemberAdd => "GUILD_MEMBER_ADD",
        GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
        GuildMemberRemove => "GUILD_MEMBER_REMOVE",
        GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
        GuildRoleCreate => "GUILD_ROLE_CREATE",
        GuildRoleUpdate => "GUILD_ROLE_UPDATE",
        GuildRoleDelete => "GUILD_ROLE_DELETE",
        GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
        ChannelCreate => "CHANNEL_CREATE",
        ChannelUpdate => "CHANNEL_UPDATE",
        ChannelDelete => "CHANNEL_DELETE",
        MessageCreate => "MESSAGE_CREATE",
        MessageUpdate => "MESSAGE_UPDATE",
        MessageDelete => "MESSAGE_DELETE",
        MessageDeleteBulk => "MESSAGE_DELETE_BULK",
        PresenceUpdate => "PRESENCE_UPDATE",
        PresencesReplace => "PRESENCES_REPLACE",
        VoiceStateUpdate => "VOICE_STATE_UPDATE",
        VoiceServerUpdate => "VOICE_SERVER_UPDATE",
        TypingStart => "TYPING_START",
        UserUpdate => "USER_UPDATE",
        InteractionCreate => "INTERACTION_CREATE",
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wire_name() {
            Some(wire) => f.write_str(wire),
            None => f.write_str(self.name()),
        }
    }
}
