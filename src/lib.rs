//! # Realtime Pub/Sub
//!
//! A reconnecting real-time pub/sub client that multiplexes named channels
//! over a single WebSocket connection.
//!
//! - [`Transport`]: one connection with reconnection, heartbeat and an
//!   offline send queue
//! - [`EventEmitter`]: synchronous, panic-isolating event registry
//! - [`Channel`]: a named stream over a shared transport
//! - [`RealtimeManager`]: owns the transport and memoizes channels
//!
//! ## Example
//!
//! ```no_run
//! use realtime_pubsub::RealtimeManager;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = RealtimeManager::new();
//!     manager.initialize("ws://localhost:8080")?;
//!
//!     let lobby = manager.channel("lobby")?;
//!     lobby.on("chat", |payload| println!("chat: {}", payload));
//!     lobby.subscribe()?;
//!     lobby.send("chat", json!({ "text": "hello" }))?;
//!
//!     manager.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod infrastructure;
pub mod manager;
pub mod messaging;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::Channel;
pub use infrastructure::ReconnectStrategy;
pub use manager::{LifecycleEvent, RealtimeManager};
pub use messaging::{EventEmitter, Listener, ListenerId, MessageType};
pub use transport::{CloseReason, Connector, Subscription, Transport, TransportOptions, WebSocketConnector};
pub use types::{ChannelMessage, ConnectionStats, ConnectionStatus, Envelope, RealtimeError, Result};
