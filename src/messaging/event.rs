use crate::types::constants::message_types;
use serde::{Deserialize, Serialize};

/// Type-safe envelope `type` values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Heartbeat request
    Ping,

    /// Heartbeat reply
    Pong,

    /// Control message announcing interest in a channel
    Subscribe,

    /// Control message withdrawing interest in a channel
    Unsubscribe,

    /// Application traffic wrapped with its channel and event name
    ChannelMessage,

    /// Any other type; dispatched to handlers registered under the same name
    Custom(String),
}

impl MessageType {
    /// Parse a string into a MessageType
    pub fn parse(s: &str) -> Self {
        match s {
            message_types::PING => Self::Ping,
            message_types::PONG => Self::Pong,
            message_types::SUBSCRIBE => Self::Subscribe,
            message_types::UNSUBSCRIBE => Self::Unsubscribe,
            message_types::CHANNEL_MESSAGE => Self::ChannelMessage,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Convert type to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => message_types::PING,
            Self::Pong => message_types::PONG,
            Self::Subscribe => message_types::SUBSCRIBE,
            Self::Unsubscribe => message_types::UNSUBSCRIBE,
            Self::ChannelMessage => message_types::CHANNEL_MESSAGE,
            Self::Custom(s) => s,
        }
    }

    /// Reserved types are consumed by the transport and never reach
    /// application handlers.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match Self::parse(&s) {
            Self::Custom(_) => Self::Custom(s),
            reserved => reserved,
        }
    }
}

impl From<MessageType> for String {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Custom(s) => s,
            reserved => reserved.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_parse() {
        assert_eq!(MessageType::parse("ping"), MessageType::Ping);
        assert_eq!(MessageType::parse("pong"), MessageType::Pong);
        assert_eq!(MessageType::parse("subscribe"), MessageType::Subscribe);
        assert_eq!(MessageType::parse("unsubscribe"), MessageType::Unsubscribe);
        assert_eq!(
            MessageType::parse("channel_message"),
            MessageType::ChannelMessage
        );
        assert_eq!(
            MessageType::parse("lobby"),
            MessageType::Custom("lobby".to_string())
        );
    }

    #[test]
    fn test_reserved_types() {
        for reserved in ["ping", "pong", "subscribe", "unsubscribe", "channel_message"] {
            assert!(MessageType::parse(reserved).is_reserved(), "{reserved}");
        }
        assert!(!MessageType::parse("notifications").is_reserved());
    }

    #[test]
    fn test_message_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&MessageType::ChannelMessage).unwrap();
        assert_eq!(json, r#""channel_message""#);

        let json = serde_json::to_string(&MessageType::Custom("orders".into())).unwrap();
        assert_eq!(json, r#""orders""#);

        let parsed: MessageType = serde_json::from_str(r#""pong""#).unwrap();
        assert_eq!(parsed, MessageType::Pong);
    }
}
