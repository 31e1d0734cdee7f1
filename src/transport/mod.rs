// Transport module - One reconnecting connection driven by a worker task
pub mod connection;
pub mod core;
pub mod options;
pub mod state;
mod worker;

pub use connection::{CloseReason, Connector, Frame, FrameSink, FrameStream, Socket, WebSocketConnector};
pub use core::{Subscription, Transport};
pub use options::{CloseCallback, ErrorCallback, MessageCallback, OpenCallback, TransportOptions};
