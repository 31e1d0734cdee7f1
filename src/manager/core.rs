use super::events::LifecycleEvent;
use super::state::Session;
use crate::channel::Channel;
use crate::messaging::{EventEmitter, Listener, MessageType};
use crate::transport::{CloseReason, Connector, Transport, TransportOptions, WebSocketConnector};
use crate::types::{ConnectionStats, ConnectionStatus, RealtimeError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Entry point tying one [`Transport`] to a set of named [`Channel`]s.
///
/// The manager is constructed explicitly and shared by the application
/// (usually behind an `Arc`). The transport is created on
/// [`initialize`](Self::initialize) and torn down on
/// [`disconnect`](Self::disconnect), after which the manager can be
/// initialized again.
///
/// Lifecycle events are re-emitted under `connected`, `disconnected`,
/// `error` and `status`.
///
/// # Example
///
/// ```no_run
/// use realtime_pubsub::{LifecycleEvent, RealtimeManager};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = RealtimeManager::new();
/// manager.on("status", |event| {
///     if let LifecycleEvent::Status(status) = event {
///         println!("status: {}", status);
///     }
/// });
///
/// manager.initialize("ws://localhost:8080")?;
///
/// let lobby = manager.channel("lobby")?;
/// lobby.on("chat", |payload| println!("chat: {}", payload));
/// lobby.subscribe()?;
/// lobby.send("chat", json!({ "text": "hi" }))?;
///
/// manager.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct RealtimeManager {
    session: Mutex<Option<Session>>,
    events: EventEmitter<LifecycleEvent>,
}

impl RealtimeManager {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            events: EventEmitter::new(),
        }
    }

    /// Creates the transport with the default policy and starts connecting.
    ///
    /// Reconnects every 3000 ms, at most 5 times per outage, with a heartbeat
    /// every 30000 ms. A second call while initialized is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UrlParse`] if `url` is malformed.
    pub fn initialize(&self, url: impl Into<String>) -> Result<()> {
        self.initialize_with(TransportOptions::new(url), WebSocketConnector::default())
    }

    /// Like [`initialize`](Self::initialize) with explicit options and connector.
    ///
    /// Callbacks already set on `options` still run; the manager chains its
    /// own event emission after them.
    pub fn initialize_with(
        &self,
        mut options: TransportOptions,
        connector: impl Connector,
    ) -> Result<()> {
        let mut session = self.session();
        if session.is_some() {
            tracing::warn!("RealtimeManager already initialized, ignoring");
            return Ok(());
        }

        self.chain_callbacks(&mut options);
        let transport = Transport::with_connector(options, connector)?;

        let events = self.events.clone();
        let status_listener = transport.on_status_change(move |status| {
            emit(&events, LifecycleEvent::Status(*status));
        })?;
        transport.connect()?;

        tracing::info!("RealtimeManager initialized");
        *session = Some(Session::new(transport, status_listener));
        Ok(())
    }

    fn chain_callbacks(&self, options: &mut TransportOptions) {
        let events = self.events.clone();
        let user_open = options.on_open.take();
        options.on_open = Some(Arc::new(move || {
            if let Some(callback) = &user_open {
                callback();
            }
            emit(&events, LifecycleEvent::Connected);
        }));

        let events = self.events.clone();
        let user_close = options.on_close.take();
        options.on_close = Some(Arc::new(move |reason: &CloseReason| {
            if let Some(callback) = &user_close {
                callback(reason);
            }
            emit(&events, LifecycleEvent::Disconnected(reason.clone()));
        }));

        let events = self.events.clone();
        let user_error = options.on_error.take();
        options.on_error = Some(Arc::new(move |error: &RealtimeError| {
            if let Some(callback) = &user_error {
                callback(error);
            }
            emit(&events, LifecycleEvent::Error(error.to_string()));
        }));
    }

    pub fn is_initialized(&self) -> bool {
        self.session().is_some()
    }

    /// Returns the channel named `name`, creating it on first use.
    ///
    /// Channels are not subscribed automatically.
    pub fn channel(&self, name: &str) -> Result<Arc<Channel>> {
        let mut session = self.session();
        let session = session.as_mut().ok_or(RealtimeError::NotInitialized)?;
        Ok(session.channel(name))
    }

    pub fn send(
        &self,
        message_type: impl Into<MessageType>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let transport = self.transport()?;
        transport.send(message_type, payload)
    }

    /// Registers a handler for `connected`, `disconnected`, `error` or `status`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> Listener<LifecycleEvent>
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.events.on(event, handler)
    }

    /// `Disconnected` until initialized
    pub fn status(&self) -> ConnectionStatus {
        self.session()
            .as_ref()
            .map(|session| session.transport.status())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.session()
            .as_ref()
            .map(|session| session.transport.stats())
            .unwrap_or_default()
    }

    /// Unsubscribes every channel, closes the transport and forgets all
    /// lifecycle listeners. No-op if not initialized.
    pub async fn disconnect(&self) -> Result<()> {
        let session = self.session().take();
        let Some(session) = session else {
            return Ok(());
        };

        for channel in session.channels.values() {
            channel.unsubscribe();
        }
        let result = session.transport.disconnect().await;

        session.status_listener.unsubscribe();
        self.events.remove_all_listeners(None);
        tracing::info!("RealtimeManager disconnected");
        result
    }

    fn transport(&self) -> Result<Transport> {
        self.session()
            .as_ref()
            .map(|session| session.transport.clone())
            .ok_or(RealtimeError::NotInitialized)
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn emit(events: &EventEmitter<LifecycleEvent>, event: LifecycleEvent) {
    events.emit(event.name(), &event);
}

impl Default for RealtimeManager {
    fn default() -> Self {
        Self::new()
    }
}
