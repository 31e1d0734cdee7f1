/// Reserved envelope types (magic strings layer)
pub mod message_types {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const CHANNEL_MESSAGE: &str = "channel_message";
}

/// Manager lifecycle event names
pub mod lifecycle_events {
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const ERROR: &str = "error";
    pub const STATUS: &str = "status";
}

/// Channel event carrying every raw inbound payload
pub const CHANNEL_RAW_MESSAGE: &str = "message";

/// Default reconnect delay (milliseconds)
pub const DEFAULT_RECONNECT_INTERVAL: u64 = 3000;

/// Default maximum consecutive reconnect attempts
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Default heartbeat interval (milliseconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30000;

/// Upper bound for exponential reconnect backoff (milliseconds)
pub const DEFAULT_MAX_RECONNECT_INTERVAL: u64 = 30000;

/// Buffer size for receivers handed out by `Channel::stream`
pub const STREAM_BUFFER_SIZE: usize = 100;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;

/// Default WebSocket handshake timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10000;
