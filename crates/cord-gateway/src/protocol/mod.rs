//! Gateway protocol
//!
//! Wire types for the gateway WebSocket: op codes, close codes, the frame
//! envelope and control payloads.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use messages::GatewayPayload;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload, StatusUpdatePayload,
};
