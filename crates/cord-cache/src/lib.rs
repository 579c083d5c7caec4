//! # cord-cache
//!
//! In-memory snapshot of the entities a session can see, kept current by
//! applying gateway events. Reads hand out clones; every write happens under
//! one exclusive lock so readers never observe a half-applied event.
//!
//! ## Example
//!
//! ```ignore
//! use cord_cache::State;
//! use cord_common::StateConfig;
//!
//! let state = State::new(StateConfig::default());
//! state.on_event(&mut event)?;
//!
//! let channel = state.channel("81384788765712384")?;
//! let perms = state.user_channel_permissions(user_id, &channel.id)?;
//! ```

pub mod error;
pub mod permission;
pub mod state;

pub use error::{StateError, StateResult};
pub use permission::member_permissions;
pub use state::State;
