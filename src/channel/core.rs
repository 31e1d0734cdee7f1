use super::state::ChannelState;
use crate::messaging::{EventEmitter, Listener, MessageType};
use crate::transport::Transport;
use crate::types::constants::{CHANNEL_RAW_MESSAGE, STREAM_BUFFER_SIZE};
use crate::types::{ChannelMessage, Envelope, Result};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A named logical stream multiplexed over a shared [`Transport`].
///
/// Channels keep two registries: named events, fed by `channel_message`
/// envelopes addressed to this channel, and the raw `message` event, which
/// sees every envelope routed here.
///
/// # Example
///
/// ```no_run
/// use realtime_pubsub::{Channel, Transport, TransportOptions};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let transport = Transport::new(TransportOptions::new("ws://localhost:8080"))?;
/// let lobby = Channel::new("lobby", transport);
///
/// lobby
///     .on("chat", |payload| println!("chat: {}", payload))
///     .on("typing", |payload| println!("typing: {}", payload));
/// lobby.subscribe()?;
///
/// lobby.send("chat", json!({ "text": "hi" }))?;
/// # Ok(())
/// # }
/// ```
pub struct Channel {
    name: String,
    transport: Transport,
    events: EventEmitter<Value>,
    messages: EventEmitter<Envelope>,
    state: Mutex<ChannelState>,
}

impl Channel {
    /// Creates an unsubscribed channel
    pub fn new(name: impl Into<String>, transport: Transport) -> Self {
        Self {
            name: name.into(),
            transport,
            events: EventEmitter::new(),
            messages: EventEmitter::new(),
            state: Mutex::new(ChannelState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_subscribed(&self) -> bool {
        self.state().is_subscribed()
    }

    /// Starts receiving messages for this channel. Idempotent.
    pub fn subscribe(&self) -> Result<()> {
        let mut state = self.state();
        if state.is_subscribed() {
            return Ok(());
        }

        let events = self.events.clone();
        let messages = self.messages.clone();
        let name = self.name.clone();
        let subscription = self.transport.subscribe(&self.name, move |envelope| {
            messages.emit(CHANNEL_RAW_MESSAGE, envelope);

            if envelope.message_type != MessageType::ChannelMessage {
                return;
            }
            match serde_json::from_value::<ChannelMessage>(envelope.payload.clone()) {
                Ok(body) if body.channel == name => {
                    events.emit(&body.event, &body.payload);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Malformed message on '{}': {}", name, e),
            }
        })?;

        tracing::info!("Subscribed to channel '{}'", self.name);
        state.subscription = Some(subscription);
        Ok(())
    }

    /// Registers a handler for a named event. Chainable.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.events.on(event, handler);
        self
    }

    /// Registers a handler for every raw envelope routed to this channel.
    pub fn on_message<F>(&self, handler: F) -> Listener<Envelope>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.messages.on(CHANNEL_RAW_MESSAGE, handler)
    }

    /// Payloads of a named event as a bounded stream.
    ///
    /// Payloads are dropped with a warning while the receiver is full. The
    /// registration lives until [`unsubscribe`](Self::unsubscribe).
    pub fn stream(&self, event: impl Into<String>) -> mpsc::Receiver<Value> {
        let event = event.into();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER_SIZE);
        let name = self.name.clone();

        self.events
            .on(event.clone(), move |payload: &Value| match tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Stream for '{}' on '{}' is full, dropping payload", event, name);
                }
                Err(TrySendError::Closed(_)) => {}
            });
        rx
    }

    /// Publishes `payload` as `event` on this channel.
    pub fn send(&self, event: impl Into<String>, payload: Value) -> Result<()> {
        let body = ChannelMessage::new(self.name.clone(), event, payload);
        self.transport
            .send(MessageType::ChannelMessage, serde_json::to_value(body)?)
    }

    /// Removes every handler and releases the transport subscription.
    pub fn unsubscribe(&self) {
        self.events.remove_all_listeners(None);
        self.messages.remove_all_listeners(None);

        if let Some(subscription) = self.state().subscription.take() {
            subscription.unsubscribe();
            tracing::info!("Unsubscribed from channel '{}'", self.name);
        }
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockServer, settle};
    use crate::transport::TransportOptions;
    use serde_json::json;
    use std::sync::{Arc, Mutex as StdMutex};

    async fn connected() -> (Transport, MockServer) {
        let (connector, mut peer) = testing::accepting();
        let transport =
            Transport::with_connector(TransportOptions::new("ws://localhost:8080"), connector)
                .unwrap();
        transport.connect().unwrap();
        let server = peer.accept().await;
        settle().await;
        (transport, server)
    }

    fn chat(channel: &str, event: &str, payload: Value) -> Envelope {
        Envelope::new(
            MessageType::ChannelMessage,
            serde_json::to_value(ChannelMessage::new(channel, event, payload)).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_wraps_channel_message() {
        let (transport, mut server) = connected().await;
        let lobby = Channel::new("lobby", transport);

        lobby.subscribe().unwrap();
        lobby.send("chat", json!({ "text": "hi" })).unwrap();

        let subscribe = server.recv().await.unwrap();
        assert_eq!(subscribe.message_type, MessageType::Subscribe);

        let sent = server.recv().await.unwrap();
        assert_eq!(sent.message_type, MessageType::ChannelMessage);
        assert_eq!(
            sent.payload,
            json!({ "channel": "lobby", "event": "chat", "payload": { "text": "hi" } })
        );
        settle().await;
        assert!(server.try_recv_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_is_idempotent() {
        let (transport, mut server) = connected().await;
        let lobby = Channel::new("lobby", transport);

        lobby.subscribe().unwrap();
        lobby.subscribe().unwrap();
        settle().await;

        assert!(lobby.is_subscribed());
        assert_eq!(server.try_recv_all().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_named_events_and_raw_messages() {
        let (transport, server) = connected().await;
        let lobby = Channel::new("lobby", transport);

        let chats = Arc::new(StdMutex::new(Vec::new()));
        let raw = Arc::new(StdMutex::new(0));
        let chat_sink = Arc::clone(&chats);
        let raw_sink = Arc::clone(&raw);

        lobby
            .on("chat", move |payload| chat_sink.lock().unwrap().push(payload.clone()))
            .on("typing", |_| panic!("no typing events expected"));
        lobby.on_message(move |_| *raw_sink.lock().unwrap() += 1);
        lobby.subscribe().unwrap();
        settle().await;

        server.push(&chat("lobby", "chat", json!({ "text": "hi" })));
        server.push(&Envelope::new("lobby", json!({ "raw": true })));
        settle().await;

        assert_eq!(*chats.lock().unwrap(), vec![json!({ "text": "hi" })]);
        assert_eq!(*raw.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_receives_payloads() {
        let (transport, server) = connected().await;
        let lobby = Channel::new("lobby", transport);
        let mut chats = lobby.stream("chat");
        lobby.subscribe().unwrap();
        settle().await;

        server.push(&chat("lobby", "chat", json!(1)));
        server.push(&chat("lobby", "chat", json!(2)));

        assert_eq!(chats.recv().await, Some(json!(1)));
        assert_eq!(chats.recv().await, Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_releases_transport() {
        let (transport, mut server) = connected().await;
        let lobby = Channel::new("lobby", transport);
        let hits = Arc::new(StdMutex::new(0));
        let sink = Arc::clone(&hits);
        lobby.on("chat", move |_| *sink.lock().unwrap() += 1);

        lobby.subscribe().unwrap();
        settle().await;
        server.try_recv_all();

        lobby.unsubscribe();
        assert!(!lobby.is_subscribed());

        let withdrawn = server.recv().await.unwrap();
        assert_eq!(withdrawn.message_type, MessageType::Unsubscribe);
        assert_eq!(withdrawn.payload, json!({ "channel": "lobby" }));

        server.push(&chat("lobby", "chat", json!({})));
        settle().await;
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_before_connect_is_queued_behind_subscribe() {
        let (connector, mut peer) = testing::accepting();
        let transport =
            Transport::with_connector(TransportOptions::new("ws://localhost:8080"), connector)
                .unwrap();
        let lobby = Channel::new("lobby", transport.clone());

        lobby.subscribe().unwrap();
        lobby.send("chat", json!({ "text": "early" })).unwrap();
        transport.connect().unwrap();

        let mut server = peer.accept().await;
        settle().await;

        let sent = server.try_recv_all();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].message_type, MessageType::Subscribe);
        assert_eq!(sent[1].payload["payload"], json!({ "text": "early" }));
    }
}
