//! Presence entity - a user's online status and activity

use serde::{Deserialize, Serialize};

use super::User;

/// Online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

/// Activity kind, carried as an integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum GameType {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    Unknown(u8),
}

impl From<u8> for GameType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Playing,
            1 => Self::Streaming,
            2 => Self::Listening,
            3 => Self::Watching,
            other => Self::Unknown(other),
        }
    }
}

impl From<GameType> for u8 {
    fn from(kind: GameType) -> Self {
        match kind {
            GameType::Playing => 0,
            GameType::Streaming => 1,
            GameType::Listening => 2,
            GameType::Watching => 3,
            GameType::Unknown(other) => other,
        }
    }
}

/// Current activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Game {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GameType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Presence entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presence {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub game: Option<Game>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

impl Presence {
    /// Fold a presence update into this presence
    ///
    /// Game and roles are always replaced; status, nick, and user fields only
    /// when the update carries them.
    pub fn merge_update(&mut self, update: &Presence) {
        self.game.clone_from(&update.game);
        self.roles.clone_from(&update.roles);
        if update.status.is_some() {
            self.status = update.status;
        }
        if update.nick.is_some() {
            self.nick.clone_from(&update.nick);
        }
        self.user.id.clone_from(&update.user.id);
        self.user.merge_partial(&update.user);
    }
}
