//! Gateway error types

use cord_http::RestError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// `open` was called while a connection exists
    #[error("web socket already opened")]
    AlreadyOpen,

    /// A frame was to be sent with no connection
    #[error("no websocket connection exists")]
    NoConnection,

    #[error("shard id {shard_id} is not lower than shard count {shard_count}")]
    InvalidShard { shard_id: u32, shard_count: u32 },

    /// The client was shut down and cannot reconnect
    #[error("session has been shut down")]
    ShutDown,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inflating a compressed frame failed
    #[error("Decompression error: {0}")]
    Decompress(#[from] std::io::Error),

    /// Resolving the gateway URL failed
    #[error("REST error: {0}")]
    Rest(#[from] RestError),
}

impl From<tungstenite::Error> for GatewayError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
