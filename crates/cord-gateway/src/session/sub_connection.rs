//! Resources tied to the gateway session
//!
//! Voice connections and similar resources are negotiated over the session
//! and must be re-established after it reconnects.

use futures::future::BoxFuture;

/// A resource that reconnects after the session does
pub trait SubConnection: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Re-establish the resource over the new session
    fn reconnect(&self) -> BoxFuture<'_, ()>;
}
