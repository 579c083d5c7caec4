//! Interactions - slash commands, message components, and modal submits
//!
//! The `data` object changes shape with the interaction `type`. Decoding
//! picks the matching [`InteractionData`] variant up front so callers match
//! on a closed enum instead of downcasting.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Member, Message, User};
use crate::error::DomainError;

/// Interaction type, carried as an integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum InteractionType {
    #[default]
    Ping,
    ApplicationCommand,
    MessageComponent,
    ApplicationCommandAutocomplete,
    ModalSubmit,
    Unknown(u8),
}

impl From<u8> for InteractionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::ApplicationCommandAutocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

impl From<InteractionType> for u8 {
    fn from(kind: InteractionType) -> Self {
        match kind {
            InteractionType::Ping => 1,
            InteractionType::ApplicationCommand => 2,
            InteractionType::MessageComponent => 3,
            InteractionType::ApplicationCommandAutocomplete => 4,
            InteractionType::ModalSubmit => 5,
            InteractionType::Unknown(other) => other,
        }
    }
}

/// One option of an invoked command, possibly nested for subcommands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub options: Vec<CommandOption>,
    pub focused: bool,
}

impl CommandOption {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value.as_ref().and_then(Value::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(Value::as_bool)
    }
}

/// Data of an application command or autocomplete interaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationCommandData {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub options: Vec<CommandOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl ApplicationCommandData {
    /// Find a top-level option by name
    pub fn option(&self, name: &str) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// Data of a button or select menu interaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageComponentData {
    pub custom_id: String,
    pub component_type: u8,
    /// Selected values, only filled for select menus
    pub values: Vec<String>,
}

/// Data of a submitted modal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalSubmitData {
    pub custom_id: String,
    pub components: Vec<Value>,
}

/// Interaction data, selected by interaction type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InteractionData {
    ApplicationCommand(ApplicationCommandData),
    MessageComponent(MessageComponentData),
    ModalSubmit(ModalSubmitData),
}

impl InteractionData {
    /// Decode raw `data` for the given interaction type
    ///
    /// Returns `Ok(None)` for types that carry no data (ping, unknown).
    pub fn decode(kind: InteractionType, raw: Value) -> Result<Option<Self>, DomainError> {
        let data = match kind {
            InteractionType::ApplicationCommand | InteractionType::ApplicationCommandAutocomplete => {
                Self::ApplicationCommand(serde_json::from_value(raw).map_err(|source| {
                    DomainError::InvalidInteractionData {
                        kind: "application command",
                        source,
                    }
                })?)
            }
            InteractionType::MessageComponent => {
                Self::MessageComponent(serde_json::from_value(raw).map_err(|source| {
                    DomainError::InvalidInteractionData {
                        kind: "message component",
                        source,
                    }
                })?)
            }
            InteractionType::ModalSubmit => {
                Self::ModalSubmit(serde_json::from_value(raw).map_err(|source| {
                    DomainError::InvalidInteractionData {
                        kind: "modal submit",
                        source,
                    }
                })?)
            }
            InteractionType::Ping | InteractionType::Unknown(_) => return Ok(None),
        };
        Ok(Some(data))
    }
}

/// Wire shape before `data` is resolved
#[derive(Deserialize)]
struct RawInteraction {
    #[serde(default)]
    id: String,
    #[serde(default)]
    application_id: String,
    #[serde(rename = "type", default)]
    kind: InteractionType,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    message: Option<Box<Message>>,
    #[serde(default)]
    token: String,
    #[serde(default)]
    version: u8,
}

/// An interaction delivered through `INTERACTION_CREATE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInteraction")]
pub struct Interaction {
    pub id: String,
    pub application_id: String,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub data: Option<InteractionData>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    /// Set for interactions inside a guild
    pub member: Option<Member>,
    /// Set for interactions inside a DM
    pub user: Option<User>,
    pub message: Option<Box<Message>>,
    pub token: String,
    pub version: u8,
}

impl TryFrom<RawInteraction> for Interaction {
    type Error = DomainError;

    fn try_from(raw: RawInteraction) -> Result<Self, Self::Error> {
        let data = match raw.data {
            Some(value) => InteractionData::decode(raw.kind, value)?,
            None => None,
        };
        Ok(Self {
            id: raw.id,
            application_id: raw.application_id,
            kind: raw.kind,
            data,
            guild_id: raw.guild_id,
            channel_id: raw.channel_id,
            member: raw.member,
            user: raw.user,
            message: raw.message,
            token: raw.token,
            version: raw.version,
        })
    }
}

impl Interaction {
    /// The user who triggered the interaction, in a guild or a DM
    pub fn invoker(&self) -> Option<&User> {
        self.member.as_ref().map(|m| &m.user).or(self.user.as_ref())
    }

    pub fn command_data(&self) -> Option<&ApplicationCommandData> {
        match &self.data {
            Some(InteractionData::ApplicationCommand(data)) => Some(data),
            _ => None,
        }
    }

    pub fn component_data(&self) -> Option<&MessageComponentData> {
        match &self.data {
            Some(InteractionData::MessageComponent(data)) => Some(data),
            _ => None,
        }
    }

    pub fn modal_data(&self) -> Option<&ModalSubmitData> {
        match &self.data {
            Some(InteractionData::ModalSubmit(data)) => Some(data),
            _ => None,
        }
    }
}
