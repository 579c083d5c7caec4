//! Gateway frame envelope
//!
//! Every frame in either direction is `{op, s, t, d}`; `s` and `t` are only
//! present on dispatches.

use super::{HelloPayload, IdentifyPayload, OpCode, ResumePayload, StatusUpdatePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One gateway frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: OpCode,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Raw payload, decoded later according to `op` and `t`
    #[serde(default)]
    pub d: Value,
}

impl GatewayPayload {
    fn control(op: OpCode, d: Value) -> Self {
        Self {
            op,
            s: None,
            t: None,
            d,
        }
    }

    // === Client frames ===

    /// Heartbeat (op=1) carrying the last sequence seen, `null` before any
    #[must_use]
    pub fn heartbeat(sequence: u64) -> Self {
        let d = if sequence == 0 {
            Value::Null
        } else {
            Value::from(sequence)
        };
        Self::control(OpCode::Heartbeat, d)
    }

    /// Identify (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::control(OpCode::Identify, serde_json::to_value(payload)?))
    }

    /// Status update (op=3)
    pub fn status_update(payload: &StatusUpdatePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::control(OpCode::StatusUpdate, serde_json::to_value(payload)?))
    }

    /// Resume (op=6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::control(OpCode::Resume, serde_json::to_value(payload)?))
    }

    // === Server frames ===

    /// Create a Dispatch frame (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            s: Some(sequence),
            t: Some(event_type.into()),
            d: data,
        }
    }

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    // === Utilities ===

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl std::fmt::Display for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayPayload(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayPayload(op={})", self.op)
        }
    }
}
