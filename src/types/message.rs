use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::MessageType;

/// Current time in millis since Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// The uniform wrapper around every message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: i64,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Envelope {
    /// Builds an envelope with a fresh id, stamped with the current time.
    pub fn new(message_type: impl Into<MessageType>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            payload,
            timestamp: now_ms(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Heartbeat ping carrying its send time in the payload.
    pub fn ping(timestamp: i64) -> Self {
        let mut envelope = Self::new(MessageType::Ping, serde_json::json!({ "timestamp": timestamp }));
        envelope.timestamp = timestamp;
        envelope
    }

    /// Control message announcing (or withdrawing) interest in a channel.
    pub fn control(message_type: MessageType, channel: &str) -> Self {
        Self::new(message_type, serde_json::json!({ "channel": channel }))
    }
}

/// Body of a `channel_message` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelMessage {
    pub channel: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ChannelMessage {
    pub fn new(
        channel: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            event: event.into(),
            payload,
        }
    }
}
