use crate::infrastructure::ReconnectStrategy;
use crate::transport::connection::CloseReason;
use crate::types::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL, Envelope,
    RealtimeError, Result,
};
use std::sync::Arc;
use std::time::Duration;

/// Invoked when a connection opens
pub type OpenCallback = Arc<dyn Fn() + Send + Sync + 'static>;
/// Invoked when an established connection closes, cleanly or not
pub type CloseCallback = Arc<dyn Fn(&CloseReason) + Send + Sync + 'static>;
/// Invoked on connection failures
pub type ErrorCallback = Arc<dyn Fn(&RealtimeError) + Send + Sync + 'static>;
/// Invoked for every inbound envelope except heartbeats
pub type MessageCallback = Arc<dyn Fn(&Envelope) + Send + Sync + 'static>;

/// Configuration for a [`Transport`](crate::Transport).
///
/// Defaults: reconnect enabled, 3000 ms between attempts, at most 5
/// attempts per outage, heartbeat every 30000 ms.
#[derive(Clone)]
pub struct TransportOptions {
    pub url: String,
    /// Sub-protocols offered in the `Sec-WebSocket-Protocol` header
    pub protocols: Vec<String>,
    pub reconnect: bool,
    pub reconnect_interval: Duration,
    /// Consecutive attempts before giving up; reset by a successful open
    pub reconnect_attempts: u32,
    pub reconnect_strategy: ReconnectStrategy,
    /// Zero disables the heartbeat
    pub heartbeat_interval: Duration,
    /// Treat an unanswered ping as a lost connection
    pub close_on_missed_heartbeat: bool,
    /// Stamped onto every outbound envelope as `userId`
    pub user_id: Option<String>,
    pub on_open: Option<OpenCallback>,
    pub on_close: Option<CloseCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_message: Option<MessageCallback>,
}

impl TransportOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            reconnect: true,
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_strategy: ReconnectStrategy::Fixed,
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL),
            close_on_missed_heartbeat: false,
            user_id: None,
            on_open: None,
            on_close: None,
            on_error: None,
            on_message: None,
        }
    }

    /// Builds options from `REALTIME_*` environment variables.
    ///
    /// `REALTIME_URL` is required; `REALTIME_USER_ID`,
    /// `REALTIME_RECONNECT_INTERVAL_MS`, `REALTIME_RECONNECT_ATTEMPTS` and
    /// `REALTIME_HEARTBEAT_INTERVAL_MS` override the defaults when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup("REALTIME_URL")
            .ok_or_else(|| RealtimeError::Config("REALTIME_URL must be set".to_string()))?;
        let mut options = Self::new(url);

        options.user_id = lookup("REALTIME_USER_ID");
        if let Some(ms) = parse_var::<u64>(&lookup, "REALTIME_RECONNECT_INTERVAL_MS")? {
            options.reconnect_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "REALTIME_RECONNECT_ATTEMPTS")? {
            options.reconnect_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "REALTIME_HEARTBEAT_INTERVAL_MS")? {
            options.heartbeat_interval = Duration::from_millis(ms);
        }

        Ok(options)
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_strategy(mut self, strategy: ReconnectStrategy) -> Self {
        self.reconnect_strategy = strategy;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_missed_heartbeat_close(mut self, enabled: bool) -> Self {
        self.close_on_missed_heartbeat = enabled;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn on_open(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(callback));
        self
    }

    pub fn on_close(mut self, callback: impl Fn(&CloseReason) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&RealtimeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_message(mut self, callback: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(callback));
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RealtimeError::Config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(None),
    }
}

impl std::fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOptions")
            .field("url", &self.url)
            .field("protocols", &self.protocols)
            .field("reconnect", &self.reconnect)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("reconnect_attempts", &self.reconnect_attempts)
            .field("reconnect_strategy", &self.reconnect_strategy)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("close_on_missed_heartbeat", &self.close_on_missed_heartbeat)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = TransportOptions::new("ws://localhost:4000/socket");
        assert!(options.reconnect);
        assert_eq!(options.reconnect_interval, Duration::from_millis(3000));
        assert_eq!(options.reconnect_attempts, 5);
        assert_eq!(options.heartbeat_interval, Duration::from_millis(30000));
        assert_eq!(options.reconnect_strategy, ReconnectStrategy::Fixed);
        assert!(options.protocols.is_empty());
    }

    #[test]
    fn test_builder_setters() {
        let options = TransportOptions::new("ws://localhost")
            .with_protocols(["v1.json", "v2.json"])
            .with_reconnect_attempts(2)
            .with_reconnect_interval(Duration::from_millis(100))
            .with_user_id("user-1");

        assert_eq!(options.protocols, vec!["v1.json", "v2.json"]);
        assert_eq!(options.reconnect_attempts, 2);
        assert_eq!(options.reconnect_interval, Duration::from_millis(100));
        assert_eq!(options.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_from_env_overrides() {
        let options = TransportOptions::from_lookup(lookup(&[
            ("REALTIME_URL", "wss://rt.example.com"),
            ("REALTIME_USER_ID", "abc"),
            ("REALTIME_RECONNECT_INTERVAL_MS", "250"),
            ("REALTIME_RECONNECT_ATTEMPTS", " 9 "),
            ("REALTIME_HEARTBEAT_INTERVAL_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(options.url, "wss://rt.example.com");
        assert_eq!(options.user_id.as_deref(), Some("abc"));
        assert_eq!(options.reconnect_interval, Duration::from_millis(250));
        assert_eq!(options.reconnect_attempts, 9);
        assert!(options.heartbeat_interval.is_zero());
    }

    #[test]
    fn test_from_env_requires_url() {
        let err = TransportOptions::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, RealtimeError::Config(_)));
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let err = TransportOptions::from_lookup(lookup(&[
            ("REALTIME_URL", "ws://localhost"),
            ("REALTIME_RECONNECT_ATTEMPTS", "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("REALTIME_RECONNECT_ATTEMPTS"));
    }
}
