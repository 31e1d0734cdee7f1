use thiserror::Error;

/// Errors that can occur when using the realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid configuration value (e.g. unparsable environment variable)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection attempt did not complete in time
    #[error("Timeout error")]
    Timeout,

    /// `channel()` or `send()` called on a manager before `initialize()`
    #[error("Realtime manager is not initialized")]
    NotInitialized,

    /// The transport worker has stopped and can no longer accept commands
    #[error("Transport is closed")]
    TransportClosed,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
