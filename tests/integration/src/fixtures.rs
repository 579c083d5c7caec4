//! Gateway payload builders

use serde_json::{json, Value};

pub const OP_DISPATCH: u64 = 0;
pub const OP_HEARTBEAT: u64 = 1;
pub const OP_IDENTIFY: u64 = 2;
pub const OP_STATUS_UPDATE: u64 = 3;
pub const OP_RESUME: u64 = 6;
pub const OP_RECONNECT: u64 = 7;
pub const OP_INVALID_SESSION: u64 = 9;
pub const OP_HELLO: u64 = 10;
pub const OP_HEARTBEAT_ACK: u64 = 11;

pub fn hello(heartbeat_interval: u64) -> Value {
    json!({ "op": OP_HELLO, "d": { "heartbeat_interval": heartbeat_interval } })
}

pub fn heartbeat_ack() -> Value {
    json!({ "op": OP_HEARTBEAT_ACK })
}

pub fn reconnect() -> Value {
    json!({ "op": OP_RECONNECT })
}

pub fn invalid_session() -> Value {
    json!({ "op": OP_INVALID_SESSION, "d": false })
}

pub fn dispatch(event_type: &str, seq: u64, data: Value) -> Value {
    json!({ "op": OP_DISPATCH, "s": seq, "t": event_type, "d": data })
}

/// READY data with one DM channel per id
pub fn ready(session_id: &str, dm_channel_ids: &[&str]) -> Value {
    let channels: Vec<Value> = dm_channel_ids
        .iter()
        .map(|id| json!({ "id": id, "type": 1 }))
        .collect();

    json!({
        "v": 6,
        "session_id": session_id,
        "user": { "id": "900", "username": "cord-bot", "discriminator": "0001", "bot": true },
        "private_channels": channels,
        "guilds": [],
    })
}

pub fn message(id: &str, channel_id: &str, content: &str) -> Value {
    json!({
        "id": id,
        "channel_id": channel_id,
        "content": content,
        "author": { "id": "901", "username": "someone", "discriminator": "0002" },
    })
}
