//! User entity

use serde::{Deserialize, Serialize};

/// A user account
///
/// Partial user objects are common on the wire (presence updates only carry
/// the id), so every field except `id` may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub verified: bool,
    pub mfa_enabled: bool,
    pub bot: bool,
}

impl User {
    /// Create a user with just an id and a name
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Mention string (`<@id>`)
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// `username#discriminator`
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Copy over the fields present in a partial user
    pub fn merge_partial(&mut self, partial: &User) {
        if !partial.username.is_empty() {
            self.username.clone_from(&partial.username);
        }
        if !partial.discriminator.is_empty() {
            self.discriminator.clone_from(&partial.discriminator);
        }
        if partial.avatar.is_some() {
            self.avatar.clone_from(&partial.avatar);
        }
        if partial.email.is_some() {
            self.email.clone_from(&partial.email);
        }
        if partial.token.is_some() {
            self.token.clone_from(&partial.token);
        }
    }
}
