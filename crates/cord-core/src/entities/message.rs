//! Message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// File attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub proxy_url: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Rich embed, reduced to the fields the client reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Embed {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<i32>,
}

/// Message entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub mention_roles: Vec<String>,
    pub tts: bool,
    pub mention_everyone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
    pub mentions: Vec<User>,
    pub pinned: bool,
}

impl Message {
    /// Create a message with content
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Fold the fields an update payload carries into this message
    ///
    /// Update payloads are partial: empty content and empty lists mean
    /// "unchanged", not "cleared".
    pub fn merge_update(&mut self, update: &Message) {
        if !update.content.is_empty() {
            self.content.clone_from(&update.content);
        }
        if update.edited_timestamp.is_some() {
            self.edited_timestamp = update.edited_timestamp;
        }
        if !update.mentions.is_empty() {
            self.mentions.clone_from(&update.mentions);
        }
        if !update.embeds.is_empty() {
            self.embeds.clone_from(&update.embeds);
        }
        if !update.attachments.is_empty() {
            self.attachments.clone_from(&update.attachments);
        }
        if update.timestamp.is_some() {
            self.timestamp = update.timestamp;
        }
        if update.author.is_some() {
            self.author.clone_from(&update.author);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_update_keeps_unset_fields() {
        let mut message = Message::new("1", "10", "hello");
        message.author = Some(User::new("2", "bob"));

        let update = Message {
            id: "1".to_string(),
            channel_id: "10".to_string(),
            embeds: vec![Embed {
                title: Some("link".to_string()),
                ..Embed::default()
            }],
            ..Message::default()
        };
        message.merge_update(&update);

        assert_eq!(message.content, "hello");
        assert_eq!(message.embeds.len(), 1);
        assert_eq!(message.author.as_ref().map(|a| a.id.as_str()), Some("2"));
    }

    #[test]
    fn test_merge_update_replaces_content() {
        let mut message = Message::new("1", "10", "hello");
        let mut update = Message::new("1", "10", "edited");
        update.edited_timestamp = Some(Utc::now());
        message.merge_update(&update);

        assert_eq!(message.content, "edited");
        assert!(message.edited_timestamp.is_some());
    }
}
