//! Integration test utilities for the cord client
//!
//! This crate provides an in-process mock of the REST API and the WebSocket
//! gateway, so the client can be driven end to end without a real service.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
