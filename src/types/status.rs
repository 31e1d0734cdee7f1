use serde::Serialize;

/// Lifecycle state of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Error,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a transport's connection statistics.
///
/// `connected_at` and `latency` describe the current connection only; the
/// counters accumulate for the lifetime of the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub status: ConnectionStatus,
    /// Epoch millis of the last successful open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<i64>,
    pub reconnect_attempts: u32,
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Round trip of the last heartbeat, in millis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<i64>,
}
