use super::connection::{CloseReason, Connector, Frame, FrameSink, FrameStream, Socket};
use super::options::TransportOptions;
use super::state::TransportState;
use crate::infrastructure::{Beat, Heartbeat, ReconnectTimer};
use crate::messaging::emitter::guarded;
use crate::messaging::{Handler, ListenerId, MessageRouter, MessageType};
use crate::types::message::now_ms;
use crate::types::{ConnectionStatus, Envelope, RealtimeError, Result};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Sleep};

/// Upper bound on waiting for the close handshake during `disconnect()`
const CLOSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Requests sent from [`Transport`](super::Transport) handles to the worker.
pub(crate) enum Command {
    Connect,
    Disconnect {
        done: oneshot::Sender<()>,
    },
    Send(Envelope),
    Subscribe {
        channel: String,
        id: ListenerId,
        handler: Handler<Envelope>,
    },
    Unsubscribe {
        channel: String,
        id: ListenerId,
    },
    WatchStatus {
        id: ListenerId,
        listener: Handler<ConnectionStatus>,
    },
    UnwatchStatus {
        id: ListenerId,
    },
}

/// Owns one connection and every piece of mutable transport state.
///
/// Lifecycle:
/// 1. `connect` starts an attempt through the [`Connector`]
/// 2. On open: announce active channels, flush the offline queue, report `connected`
/// 3. While open: read frames, run the heartbeat, serve commands
/// 4. On abnormal close or failed attempt: report `error`, then schedule a
///    reconnect until the attempt cap is reached
pub(crate) struct Worker {
    options: TransportOptions,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: TransportState,
    router: MessageRouter,
    heartbeat: Heartbeat,
    reconnect: ReconnectTimer,
    auto_reconnect: bool,
    connecting: Option<BoxFuture<'static, Result<Socket>>>,
    reconnect_delay: Option<Pin<Box<Sleep>>>,
    sink: Option<FrameSink>,
    stream: Option<FrameStream>,
}

impl Worker {
    pub(crate) fn new(
        options: TransportOptions,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        state: TransportState,
    ) -> Self {
        let heartbeat = Heartbeat::new(options.heartbeat_interval)
            .with_missed_detection(options.close_on_missed_heartbeat);
        let reconnect = ReconnectTimer::new(
            options.reconnect_interval,
            options.reconnect_attempts,
            options.reconnect_strategy.clone(),
        );

        Self {
            auto_reconnect: options.reconnect,
            options,
            connector,
            commands,
            state,
            router: MessageRouter::new(),
            heartbeat,
            reconnect,
            connecting: None,
            reconnect_delay: None,
            sink: None,
            stream: None,
        }
    }

    /// Runs until every handle to the transport has been dropped.
    pub(crate) async fn run(mut self) {
        tracing::debug!("Starting transport worker for {}", self.options.url);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                outcome = poll_slot(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_outcome(outcome).await;
                }
                frame = next_frame(&mut self.stream) => self.on_frame(frame).await,
                beat = self.heartbeat.tick() => self.on_beat(beat).await,
                () = sleep_slot(&mut self.reconnect_delay) => {
                    self.reconnect_delay = None;
                    self.attempt_reconnect();
                }
            }
        }

        self.heartbeat.stop();
        self.close_socket().await;
        tracing::debug!("Transport worker finished");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                self.auto_reconnect = self.options.reconnect;
                self.reconnect.reset();
                self.reconnect_delay = None;
                self.start_connect();
            }
            Command::Disconnect { done } => {
                self.disconnect().await;
                let _ = done.send(());
            }
            Command::Send(envelope) => self.send(envelope).await,
            Command::Subscribe {
                channel,
                id,
                handler,
            } => {
                if self.router.add(&channel, id, handler) {
                    tracing::info!("Subscribing to channel: {}", channel);
                    self.send_control(MessageType::Subscribe, &channel).await;
                }
            }
            Command::Unsubscribe { channel, id } => {
                if self.router.remove(&channel, id) {
                    tracing::info!("Unsubscribing from channel: {}", channel);
                    self.send_control(MessageType::Unsubscribe, &channel).await;
                }
            }
            Command::WatchStatus { id, listener } => self.state.add_status_listener(id, listener),
            Command::UnwatchStatus { id } => {
                self.state.remove_status_listener(id);
            }
        }
    }

    fn start_connect(&mut self) {
        if self.is_open() || self.connecting.is_some() {
            return;
        }

        tracing::info!("Connecting to {}", self.options.url);
        self.state.set_status(ConnectionStatus::Connecting);
        self.connecting = Some(
            self.connector
                .connect(&self.options.url, &self.options.protocols),
        );
    }

    fn attempt_reconnect(&mut self) {
        self.state.stats.reconnect_attempts += 1;
        tracing::info!(
            "Attempting to reconnect ({}/{})",
            self.reconnect.attempts(),
            self.options.reconnect_attempts
        );
        self.start_connect();
    }

    async fn on_connect_outcome(&mut self, outcome: Result<Socket>) {
        match outcome {
            Ok(socket) => {
                self.sink = Some(socket.sink);
                self.stream = Some(socket.stream);

                if !self.announce_channels().await || !self.flush_queue().await {
                    return;
                }

                self.reconnect.reset();

                self.state.stats.connected_at = Some(now_ms());
                self.state.stats.latency = None;
                self.heartbeat.start();
                self.state.set_status(ConnectionStatus::Connected);
                tracing::info!("Connected to {}", self.options.url);

                if let Some(on_open) = &self.options.on_open {
                    guarded("on_open", || on_open());
                }
            }
            Err(e) => {
                tracing::error!("Connection attempt failed: {}", e);
                self.state.set_status(ConnectionStatus::Error);
                self.notify_error(&e);
                self.schedule_reconnect();
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Frame>>) {
        match frame {
            Some(Ok(Frame::Text(text))) => self.on_text(&text).await,
            Some(Ok(Frame::Closed(Some(reason)))) if reason.clean => self.on_clean_close(reason),
            Some(Ok(Frame::Closed(reason))) => {
                let reason = reason
                    .unwrap_or_else(|| CloseReason::abnormal("closed without close frame"));
                self.connection_lost(reason).await;
            }
            Some(Err(e)) => {
                tracing::error!("WebSocket read error: {}", e);
                self.connection_lost(CloseReason::abnormal(e.to_string()))
                    .await;
            }
            None => {
                self.connection_lost(CloseReason::abnormal("stream ended"))
                    .await;
            }
        }
    }

    async fn on_text(&mut self, text: &str) {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Failed to parse message: {} - Raw: {}", e, text);
                return;
            }
        };

        self.state.stats.messages_received += 1;
        self.state.publish_stats();

        if envelope.message_type.is_heartbeat() {
            self.on_heartbeat(envelope).await;
            return;
        }

        if let Some(on_message) = &self.options.on_message {
            guarded("on_message", || on_message(&envelope));
        }
        self.router.route(&envelope);
    }

    /// Consumes an inbound `ping` or `pong`; neither reaches handlers.
    async fn on_heartbeat(&mut self, envelope: Envelope) {
        if envelope.message_type == MessageType::Pong {
            if let Some(latency) = self.heartbeat.acknowledge(&envelope, now_ms()) {
                tracing::debug!("Heartbeat latency {} ms", latency);
                self.state.stats.latency = Some(latency);
                self.state.publish_stats();
            }
            return;
        }

        let pong = Envelope::new(MessageType::Pong, envelope.payload)
            .with_user_id(self.options.user_id.clone());
        if let Err(e) = self.write(&pong).await {
            tracing::warn!("Failed to answer ping: {}", e);
            self.connection_lost(CloseReason::abnormal(e.to_string()))
                .await;
        }
    }

    async fn on_beat(&mut self, beat: Beat) {
        match beat {
            Beat::Ping(ping) => {
                let ping = ping.with_user_id(self.options.user_id.clone());
                if let Err(e) = self.write(&ping).await {
                    tracing::error!("[Heartbeat] Failed to send: {}", e);
                    self.connection_lost(CloseReason::abnormal(e.to_string()))
                        .await;
                }
            }
            Beat::Missed => {
                self.connection_lost(CloseReason::abnormal("heartbeat timeout"))
                    .await;
            }
        }
    }

    async fn send(&mut self, envelope: Envelope) {
        if !self.is_open() || !self.state.queue.is_empty() {
            tracing::debug!(
                "Queued {} ({}) until connected, {} pending",
                envelope.id,
                envelope.message_type,
                self.state.queue.len() + 1
            );
            self.state.queue.push_back(envelope);
            return;
        }

        if let Err(e) = self.write(&envelope).await {
            tracing::warn!("Send failed, queueing {}: {}", envelope.id, e);
            self.state.queue.push_back(envelope);
            self.connection_lost(CloseReason::abnormal(e.to_string()))
                .await;
        }
    }

    /// Control messages are only meaningful on a live connection; every
    /// open re-announces active channels, so nothing is queued here.
    async fn send_control(&mut self, message_type: MessageType, channel: &str) {
        if !self.is_open() {
            return;
        }
        let envelope =
            Envelope::control(message_type, channel).with_user_id(self.options.user_id.clone());
        if let Err(e) = self.write(&envelope).await {
            tracing::warn!("Failed to send {} for '{}': {}", envelope.message_type, channel, e);
            self.connection_lost(CloseReason::abnormal(e.to_string()))
                .await;
        }
    }

    /// Returns `false` if the connection was lost while announcing.
    async fn announce_channels(&mut self) -> bool {
        for channel in self.router.active_channels() {
            let envelope = Envelope::control(MessageType::Subscribe, &channel)
                .with_user_id(self.options.user_id.clone());
            if let Err(e) = self.write(&envelope).await {
                tracing::warn!("Failed to re-subscribe {}: {}", channel, e);
                self.connection_lost(CloseReason::abnormal(e.to_string()))
                    .await;
                return false;
            }
        }
        true
    }

    /// Drains the offline queue in insertion order. Returns `false` if the
    /// connection was lost mid-flush; unsent envelopes stay queued.
    async fn flush_queue(&mut self) -> bool {
        if !self.state.queue.is_empty() {
            tracing::debug!("Flushing {} queued message(s)", self.state.queue.len());
        }

        while let Some(envelope) = self.state.queue.pop_front() {
            if let Err(e) = self.write(&envelope).await {
                tracing::warn!("Flush failed at {}: {}", envelope.id, e);
                self.state.queue.push_front(envelope);
                self.connection_lost(CloseReason::abnormal(e.to_string()))
                    .await;
                return false;
            }
        }
        true
    }

    async fn write(&mut self, envelope: &Envelope) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(RealtimeError::Connection("socket is not open".to_string()));
        };

        let json = serde_json::to_string(envelope)?;
        sink.send(json).await?;

        self.state.stats.messages_sent += 1;
        self.state.publish_stats();
        Ok(())
    }

    fn on_clean_close(&mut self, reason: CloseReason) {
        tracing::info!("Server closed connection cleanly: {}", reason.reason);
        self.drop_socket();
        self.state.set_status(ConnectionStatus::Disconnected);
        self.notify_close(&reason);
    }

    async fn connection_lost(&mut self, reason: CloseReason) {
        // Only a connection that reached `connected` reports a close
        let was_open = self.state.status() == ConnectionStatus::Connected;
        tracing::warn!("Connection lost: {}", reason.reason);

        self.drop_socket();
        self.state.set_status(ConnectionStatus::Error);
        self.notify_error(&RealtimeError::Connection(reason.reason.clone()));
        if was_open {
            self.notify_close(&reason);
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.auto_reconnect {
            tracing::debug!("Auto-reconnect disabled, staying in {}", self.state.status());
            return;
        }

        match self.reconnect.next_delay() {
            Some(delay) => {
                tracing::info!(
                    "Reconnecting in {:?} (attempt {}/{})",
                    delay,
                    self.reconnect.attempts(),
                    self.options.reconnect_attempts
                );
                self.state.set_status(ConnectionStatus::Reconnecting);
                self.reconnect_delay = Some(Box::pin(time::sleep(delay)));
            }
            None => {
                tracing::warn!(
                    "Max reconnect attempts ({}) reached, giving up",
                    self.options.reconnect_attempts
                );
            }
        }
    }

    async fn disconnect(&mut self) {
        self.auto_reconnect = false;
        self.reconnect_delay = None;
        self.connecting = None;
        self.heartbeat.stop();

        let was_open = self.close_socket().await;
        self.state.set_status(ConnectionStatus::Disconnected);
        if was_open {
            self.notify_close(&CloseReason::local());
        }
        tracing::info!("Disconnected from {}", self.options.url);
    }

    /// Closes the socket if one is open. Returns whether there was one.
    async fn close_socket(&mut self) -> bool {
        self.stream = None;
        let Some(mut sink) = self.sink.take() else {
            return false;
        };

        match time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Error while closing socket: {}", e),
            Err(_) => tracing::debug!("Timed out waiting for close handshake"),
        }
        true
    }

    fn drop_socket(&mut self) {
        self.heartbeat.stop();
        self.sink = None;
        self.stream = None;
    }

    fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    fn notify_error(&self, error: &RealtimeError) {
        if let Some(on_error) = &self.options.on_error {
            guarded("on_error", || on_error(error));
        }
    }

    fn notify_close(&self, reason: &CloseReason) {
        if let Some(on_close) = &self.options.on_close {
            guarded("on_close", || on_close(reason));
        }
    }
}

async fn poll_slot<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<Frame>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_slot(delay: &mut Option<Pin<Box<Sleep>>>) {
    match delay {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
