use super::MessageType;
use super::emitter::{EventEmitter, Handler, ListenerId};
use crate::types::message::{ChannelMessage, Envelope};

/// Routes inbound envelopes to the handlers registered per channel name.
///
/// A `channel_message` envelope is addressed by the `channel` field of its
/// body; any non-reserved envelope is addressed by its `type`. Heartbeats and
/// control messages are never routed.
pub struct MessageRouter {
    channels: EventEmitter<Envelope>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            channels: EventEmitter::new(),
        }
    }

    /// Registers a handler. Returns `true` if it is the first for `channel`.
    pub fn add(&self, channel: &str, id: ListenerId, handler: Handler<Envelope>) -> bool {
        let first = !self.channels.has_listeners(channel);
        self.channels.insert(channel, id, handler);
        first
    }

    /// Removes a handler. Returns `true` if `channel` has no handlers left
    /// as a result.
    pub fn remove(&self, channel: &str, id: ListenerId) -> bool {
        self.channels.off(channel, id) && !self.channels.has_listeners(channel)
    }

    /// Names with at least one registered handler
    pub fn active_channels(&self) -> Vec<String> {
        let mut names = self.channels.event_names();
        names.sort();
        names
    }

    /// Routes a message to the appropriate handler(s) and returns how many ran
    pub fn route(&self, envelope: &Envelope) -> usize {
        let Some(channel) = Self::target(envelope) else {
            return 0;
        };

        let delivered = self.channels.emit(&channel, envelope);
        if delivered == 0 {
            tracing::debug!("No handlers for channel '{}', dropping {}", channel, envelope.id);
        } else {
            tracing::debug!(
                "Routed {} ({}) to {} handler(s) on '{}'",
                envelope.id,
                envelope.message_type,
                delivered,
                channel
            );
        }
        delivered
    }

    /// Channel name an envelope is addressed to, if any
    fn target(envelope: &Envelope) -> Option<String> {
        match &envelope.message_type {
            MessageType::ChannelMessage => {
                match serde_json::from_value::<ChannelMessage>(envelope.payload.clone()) {
                    Ok(body) => Some(body.channel),
                    Err(e) => {
                        tracing::warn!("Dropping malformed channel_message {}: {}", envelope.id, e);
                        None
                    }
                }
            }
            other if other.is_reserved() => None,
            other => Some(other.as_str().to_string()),
        }
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}
