//! # cord-core
//!
//! Domain layer containing the entities the gateway and REST API exchange,
//! the permission bitflags, and the typed gateway events.
//! This crate has no I/O and no async runtime dependency.

pub mod entities;
pub mod error;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    ApplicationCommandData, Attachment, Channel, ChannelType, CommandOption, Embed, Emoji, Game,
    GameType, Guild, Interaction, InteractionData, InteractionType, Member, Message,
    MessageComponentData, ModalSubmitData, OverwriteType, PermissionOverwrite, Presence, Role,
    Status, User, VoiceState,
};
pub use error::DomainError;
pub use events::{Event, EventKind, EventPayload, EventSink, NullSink};
pub use value_objects::Permissions;
