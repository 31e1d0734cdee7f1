//! In-memory connector for driving the transport state machine in tests.

use crate::transport::{CloseReason, Connector, Frame, Socket};
use crate::types::{Envelope, RealtimeError, Result};
use futures::channel::mpsc as chan;
use futures::future::{self, BoxFuture};
use futures::{FutureExt, SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How the connector answers one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    Accept,
    Refuse,
    /// Opens, but every write fails
    Broken,
}

pub(crate) struct MockConnector {
    plan: Mutex<VecDeque<Attempt>>,
    fallback: Attempt,
    attempts: Arc<Mutex<Vec<Instant>>>,
    servers: mpsc::UnboundedSender<MockServer>,
}

/// Test-side view of a [`MockConnector`]
pub(crate) struct MockPeer {
    servers: mpsc::UnboundedReceiver<MockServer>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

/// Server end of one accepted mock connection. Dropping it ends the
/// client's stream, which the transport sees as an abnormal close.
pub(crate) struct MockServer {
    outbound: chan::UnboundedReceiver<String>,
    inbound: chan::UnboundedSender<Result<Frame>>,
}

/// Connector that accepts every attempt
pub(crate) fn accepting() -> (MockConnector, MockPeer) {
    scripted([], Attempt::Accept)
}

/// Connector answering attempts from `plan`, then with `fallback`
pub(crate) fn scripted(
    plan: impl IntoIterator<Item = Attempt>,
    fallback: Attempt,
) -> (MockConnector, MockPeer) {
    let (servers_tx, servers_rx) = mpsc::unbounded_channel();
    let attempts = Arc::new(Mutex::new(Vec::new()));

    let connector = MockConnector {
        plan: Mutex::new(plan.into_iter().collect()),
        fallback,
        attempts: Arc::clone(&attempts),
        servers: servers_tx,
    };
    let peer = MockPeer {
        servers: servers_rx,
        attempts,
    };
    (connector, peer)
}

impl Connector for MockConnector {
    fn connect(&self, _url: &str, _protocols: &[String]) -> BoxFuture<'static, Result<Socket>> {
        self.attempts.lock().unwrap().push(Instant::now());
        let attempt = self.plan.lock().unwrap().pop_front().unwrap_or(self.fallback);

        if attempt == Attempt::Refuse {
            return future::ready(Err(RealtimeError::Connection(
                "connection refused".to_string(),
            )))
            .boxed();
        }

        let (out_tx, out_rx) = chan::unbounded::<String>();
        let (in_tx, in_rx) = chan::unbounded::<Result<Frame>>();
        let server = MockServer {
            outbound: out_rx,
            inbound: in_tx,
        };
        if attempt == Attempt::Broken {
            drop(server);
        } else {
            let _ = self.servers.send(server);
        }

        let socket = Socket {
            sink: Box::pin(out_tx.sink_map_err(|e| RealtimeError::Connection(e.to_string()))),
            stream: Box::pin(in_rx),
        };
        future::ready(Ok(socket)).boxed()
    }
}

impl MockPeer {
    /// Next accepted connection
    pub(crate) async fn accept(&mut self) -> MockServer {
        self.servers.recv().await.expect("connector dropped")
    }

    /// When each connection attempt started
    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl MockServer {
    /// Next envelope written by the client, `None` once the client closed
    pub(crate) async fn recv(&mut self) -> Option<Envelope> {
        let text = self.outbound.next().await?;
        Some(serde_json::from_str(&text).expect("client wrote invalid JSON"))
    }

    /// Everything written so far without waiting
    pub(crate) fn try_recv_all(&mut self) -> Vec<Envelope> {
        let mut received = Vec::new();
        while let Ok(text) = self.outbound.try_recv() {
            received.push(serde_json::from_str(&text).expect("client wrote invalid JSON"));
        }
        received
    }

    pub(crate) fn push(&self, envelope: &Envelope) {
        let text = serde_json::to_string(envelope).unwrap();
        self.push_text(&text);
    }

    pub(crate) fn push_text(&self, text: &str) {
        let _ = self.inbound.unbounded_send(Ok(Frame::Text(text.to_string())));
    }

    pub(crate) fn close(&self, code: u16) {
        let reason = CloseReason::from_frame(code, "server closing");
        let _ = self.inbound.unbounded_send(Ok(Frame::Closed(Some(reason))));
    }

    pub(crate) fn error(&self) {
        let _ = self
            .inbound
            .unbounded_send(Err(RealtimeError::Connection("connection reset".to_string())));
    }
}

/// Lets the worker drain everything that is ready
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
