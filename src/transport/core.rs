use super::connection::{Connector, WebSocketConnector};
use super::options::TransportOptions;
use super::state::TransportState;
use super::worker::{Command, Worker};
use crate::messaging::{ListenerId, MessageType};
use crate::types::{ConnectionStats, ConnectionStatus, Envelope, RealtimeError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use url::Url;

/// A single persistent connection with automatic reconnection, heartbeat
/// keep-alive and an offline send queue.
///
/// `Transport` is a cheap handle: clones share one background worker task
/// that owns the socket and all mutable state. The worker shuts down once
/// every handle is dropped.
///
/// # Example
///
/// ```no_run
/// use realtime_pubsub::{Transport, TransportOptions};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Transport::new(TransportOptions::new("ws://localhost:8080"))?;
/// transport.connect()?;
///
/// let subscription = transport.subscribe("lobby", |envelope| {
///     println!("lobby: {}", envelope.payload);
/// })?;
///
/// // Queued until the socket is open
/// transport.send("lobby", json!({ "text": "hi" }))?;
///
/// subscription.unsubscribe();
/// transport.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    stats: watch::Receiver<ConnectionStats>,
    user_id: Option<String>,
}

impl Transport {
    /// Creates a transport over a real WebSocket. Does not connect.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UrlParse`] if the URL is malformed, or
    /// [`RealtimeError::Config`] when called outside a Tokio runtime.
    pub fn new(options: TransportOptions) -> Result<Self> {
        Self::with_connector(options, WebSocketConnector::default())
    }

    /// Creates a transport that establishes sockets through `connector`.
    pub fn with_connector(options: TransportOptions, connector: impl Connector) -> Result<Self> {
        Url::parse(&options.url)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            RealtimeError::Config("Transport must be created inside a Tokio runtime".to_string())
        })?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (stats_tx, stats_rx) = watch::channel(ConnectionStats::default());

        let user_id = options.user_id.clone();
        let state = TransportState::new(status_tx, stats_tx);
        let worker = Worker::new(options, Arc::new(connector), commands_rx, state);
        runtime.spawn(worker.run());

        Ok(Self {
            commands: commands_tx,
            status: status_rx,
            stats: stats_rx,
            user_id,
        })
    }

    /// Starts connecting. No-op if already connected or connecting.
    ///
    /// Connection failures are not returned here: they move the status to
    /// `error`, run the `on_error` callback and hand over to the reconnect
    /// policy. Calling `connect()` again after the policy gave up starts a
    /// fresh reconnect cycle.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Closes the connection and stops all timers.
    ///
    /// Resolves once the worker has torn everything down, so no heartbeat or
    /// reconnect fires afterwards. Safe to call repeatedly.
    pub async fn disconnect(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command(Command::Disconnect { done: done_tx })?;
        done_rx.await.map_err(|_| RealtimeError::TransportClosed)
    }

    /// Sends an envelope of the given type, or queues it until the next
    /// successful open.
    pub fn send(
        &self,
        message_type: impl Into<MessageType>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let envelope = Envelope::new(message_type, payload).with_user_id(self.user_id.clone());
        tracing::debug!("Sending {} ({})", envelope.id, envelope.message_type);
        self.command(Command::Send(envelope))
    }

    /// Registers a handler for messages addressed to `channel`.
    ///
    /// The first handler for a name announces a `subscribe` upstream; dropping
    /// the last one through [`Subscription::unsubscribe`] sends `unsubscribe`.
    pub fn subscribe<F>(&self, channel: impl Into<String>, handler: F) -> Result<Subscription>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let channel = channel.into();
        let id = ListenerId::next();
        self.command(Command::Subscribe {
            channel: channel.clone(),
            id,
            handler: Arc::new(handler),
        })?;

        Ok(Subscription {
            id,
            target: Target::Channel(channel),
            commands: self.commands.clone(),
        })
    }

    /// Registers a status listener. It runs once with the current status,
    /// then on every transition.
    pub fn on_status_change<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.command(Command::WatchStatus {
            id,
            listener: Arc::new(listener),
        })?;

        Ok(Subscription {
            id,
            target: Target::Status,
            commands: self.commands.clone(),
        })
    }

    /// Receiver that observes every status the worker publishes
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.borrow().clone()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RealtimeError::TransportClosed)
    }
}

#[derive(Debug)]
enum Target {
    Channel(String),
    Status,
}

/// Registration returned by [`Transport::subscribe`] and
/// [`Transport::on_status_change`].
///
/// Dropping it keeps the registration alive; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    target: Target,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Channel name for a message subscription
    pub fn channel(&self) -> Option<&str> {
        match &self.target {
            Target::Channel(name) => Some(name),
            Target::Status => None,
        }
    }

    pub fn unsubscribe(self) {
        let command = match self.target {
            Target::Channel(channel) => Command::Unsubscribe {
                channel,
                id: self.id,
            },
            Target::Status => Command::UnwatchStatus { id: self.id },
        };
        // Nothing left to unregister from once the worker is gone
        let _ = self.commands.send(command);
    }
}
