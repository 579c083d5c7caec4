//! Domain entities - the objects the gateway and REST API describe

mod channel;
mod emoji;
mod guild;
mod interaction;
mod member;
mod message;
mod presence;
mod role;
mod user;
mod voice_state;

pub use channel::{Channel, ChannelType, OverwriteType, PermissionOverwrite};
pub use emoji::Emoji;
pub use guild::Guild;
pub use interaction::{
    ApplicationCommandData, CommandOption, Interaction, InteractionData, InteractionType,
    MessageComponentData, ModalSubmitData,
};
pub use member::Member;
pub use message::{Attachment, Embed, Message};
pub use presence::{Game, GameType, Presence, Status};
pub use role::Role;
pub use user::User;
pub use voice_state::VoiceState;
