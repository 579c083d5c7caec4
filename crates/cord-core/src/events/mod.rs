//! Gateway events
//!
//! [`Event`] is the closed set of everything a session can deliver to
//! handlers. [`EventSink`] is the seam through which components that do not
//! own the dispatcher (the REST layer, for rate-limit notices) emit events.

mod event;
mod payloads;

pub use event::{Event, EventKind, EventPayload};
pub use payloads::{
    ChannelCreate, ChannelDelete, ChannelUpdate, Connect, Disconnect, GuildCreate, GuildDelete,
    GuildEmojisUpdate, GuildMemberAdd, GuildMemberRemove, GuildMemberUpdate, GuildMembersChunk,
    GuildRoleCreate, GuildRoleDelete, GuildRoleUpdate, GuildUpdate, InteractionCreate,
    MessageCreate, MessageDelete, MessageDeleteBulk, MessageUpdate, PresenceUpdate,
    PresencesReplace, RateLimit, Ready, Resumed, TooManyRequests, TypingStart, UserUpdate,
    VoiceServerUpdate, VoiceStateUpdate,
};

/// Receives events produced outside the gateway read loop
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that drops everything, for components used standalone
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}
