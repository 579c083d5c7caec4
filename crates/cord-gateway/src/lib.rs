//! # cord-gateway
//!
//! Gateway session, event dispatch, and the [`Client`] that ties them to the
//! REST layer and the state cache.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod session;

pub use client::Client;
pub use dispatcher::{Dispatcher, HandlerRegistration};
pub use error::{GatewayError, GatewayResult};
pub use session::{Backoff, GatewaySession, SessionState, SubConnection};
