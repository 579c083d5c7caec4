//! Emoji entity

use serde::{Deserialize, Serialize};

/// A custom guild emoji
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Emoji {
    pub id: String,
    pub name: String,
    pub roles: Vec<String>,
    pub managed: bool,
    pub require_colons: bool,
    pub animated: bool,
}

impl Emoji {
    /// Format usable inside message content
    pub fn message_format(&self) -> String {
        if self.id.is_empty() {
            return self.name.clone();
        }
        if self.animated {
            format!("<a:{}:{}>", self.name, self.id)
        } else {
            format!("<:{}:{}>", self.name, self.id)
        }
    }
}
