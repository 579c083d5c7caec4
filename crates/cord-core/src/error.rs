//! Domain errors

use thiserror::Error;

/// Errors raised while interpreting wire payloads
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid {kind} interaction data: {source}")]
    InvalidInteractionData {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid permissions value: {0}")]
    InvalidPermissions(String),

    #[error("Failed to decode {event} payload: {source}")]
    EventDecode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
