//! Voice state entity

use serde::{Deserialize, Serialize};

/// A user's connection to a voice channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceState {
    pub user_id: String,
    pub session_id: String,
    /// `None` (or empty) when the user left voice
    pub channel_id: Option<String>,
    pub guild_id: String,
    pub suppress: bool,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub mute: bool,
    pub deaf: bool,
}

impl VoiceState {
    /// True when this state reports a disconnect
    pub fn is_leave(&self) -> bool {
        self.channel_id.as_deref().map_or(true, str::is_empty)
    }
}
