//! Control frame payloads
//!
//! The `d` field of the frames this client sends, plus the server's Hello.

use cord_core::{Game, GameType};
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    pub compress: bool,
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`, only sent when sharding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
    #[serde(rename = "$referer")]
    pub referer: String,
    #[serde(rename = "$referring_domain")]
    pub referring_domain: String,
}

impl IdentifyProperties {
    /// Properties describing this library on the current platform
    #[must_use]
    pub fn new() -> Self {
        let library = format!("cord v{}", env!("CARGO_PKG_VERSION"));
        Self {
            os: std::env::consts::OS.to_string(),
            browser: library.clone(),
            device: library,
            referer: String::new(),
            referring_domain: String::new(),
        }
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// Payload for op 3 (Status Update)
///
/// Both fields serialize as `null` when unset; the server reads that as
/// "not idle" and "no game".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    /// Unix time in milliseconds since the client went idle
    pub idle_since: Option<i64>,
    pub game: Option<Game>,
}

impl StatusUpdatePayload {
    /// Build a status update
    ///
    /// An empty `game` clears the game. A non-empty `url` marks the game as
    /// a stream. A non-positive `idle_since` means not idle.
    #[must_use]
    pub fn new(idle_since: i64, game: &str, url: &str) -> Self {
        let game = (!game.is_empty()).then(|| {
            let (kind, url) = if url.is_empty() {
                (GameType::Playing, None)
            } else {
                (GameType::Streaming, Some(url.to_string()))
            };
            Game {
                name: game.to_string(),
                kind,
                url,
            }
        });

        Self {
            idle_since: (idle_since > 0).then_some(idle_since),
            game,
        }
    }
}
