use crate::types::{DEFAULT_CONNECT_TIMEOUT, RealtimeError, Result, WS_CLOSE_NORMAL};
use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};

/// Outbound half of a socket: serialized envelopes
pub type FrameSink = Pin<Box<dyn Sink<String, Error = RealtimeError> + Send>>;

/// Inbound half of a socket. The stream ending without a [`Frame::Closed`]
/// counts as an abnormal close.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Inbound frame as seen by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Closed(Option<CloseReason>),
}

/// Why an established connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: Option<u16>,
    pub reason: String,
    /// Closed with the normal close code or by a local `disconnect()`
    pub clean: bool,
}

impl CloseReason {
    pub fn from_frame(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
            clean: code == WS_CLOSE_NORMAL,
        }
    }

    pub fn local() -> Self {
        Self {
            code: Some(WS_CLOSE_NORMAL),
            reason: "client disconnect".to_string(),
            clean: true,
        }
    }

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
            clean: false,
        }
    }
}

/// An established connection split into its two halves
pub struct Socket {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Establishes sockets for a transport.
///
/// The transport calls `connect` for the initial attempt and for every
/// reconnect attempt; a failed future counts as a failed attempt.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str, protocols: &[String]) -> BoxFuture<'static, Result<Socket>>;
}

/// Default [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    timeout: Duration,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Handshake deadline per attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str, protocols: &[String]) -> BoxFuture<'static, Result<Socket>> {
        let url = url.to_string();
        let protocols = protocols.join(", ");
        let timeout = self.timeout;

        Box::pin(async move {
            let mut request = url.as_str().into_client_request()?;
            if !protocols.is_empty() {
                let value = HeaderValue::from_str(&protocols).map_err(|e| {
                    RealtimeError::Connection(format!("Invalid sub-protocol list: {}", e))
                })?;
                request.headers_mut().insert("Sec-WebSocket-Protocol", value);
            }

            tracing::debug!("Creating WebSocket connection to: {}", url);
            let (ws_stream, response) =
                tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
                    .await
                    .map_err(|_| RealtimeError::Timeout)??;
            tracing::debug!("WebSocket handshake completed: {}", response.status());

            let (write_half, read_half) = ws_stream.split();

            let sink = write_half
                .sink_map_err(RealtimeError::from)
                .with(|text: String| future::ready(Ok::<_, RealtimeError>(Message::Text(text.into()))));

            let stream = read_half.filter_map(|msg_result| future::ready(into_frame(msg_result)));

            Ok(Socket {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

fn into_frame(
    msg_result: std::result::Result<Message, tungstenite::Error>,
) -> Option<Result<Frame>> {
    match msg_result {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
        Ok(Message::Close(frame)) => {
            let reason = frame.map(|close_frame| {
                tracing::debug!(
                    "Server closed connection: code={:?}, reason='{}'",
                    close_frame.code,
                    close_frame.reason
                );
                CloseReason::from_frame(u16::from(close_frame.code), close_frame.reason.to_string())
            });
            Some(Ok(Frame::Closed(reason)))
        }
        Ok(Message::Ping(data)) => {
            tracing::debug!("Received ping ({} bytes)", data.len());
            None
        }
        Ok(Message::Pong(data)) => {
            tracing::debug!("Received pong ({} bytes)", data.len());
            None
        }
        Ok(Message::Binary(data)) => {
            tracing::warn!("Received unexpected binary message ({} bytes)", data.len());
            None
        }
        Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(e.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_cleanliness() {
        assert!(CloseReason::from_frame(1000, "bye").clean);
        assert!(!CloseReason::from_frame(1011, "server error").clean);
        assert!(CloseReason::local().clean);
        assert!(!CloseReason::abnormal("reset").clean);
    }

    #[test]
    fn test_text_frames_pass_through() {
        let frame = into_frame(Ok(Message::Text("{}".into())));
        assert_eq!(frame.unwrap().unwrap(), Frame::Text("{}".to_string()));
    }

    #[test]
    fn test_control_frames_are_skipped() {
        assert!(into_frame(Ok(Message::Ping(Default::default()))).is_none());
        assert!(into_frame(Ok(Message::Pong(Default::default()))).is_none());
        assert!(into_frame(Ok(Message::Binary(vec![1, 2, 3].into()))).is_none());
    }

    #[test]
    fn test_close_without_frame() {
        let frame = into_frame(Ok(Message::Close(None)));
        assert_eq!(frame.unwrap().unwrap(), Frame::Closed(None));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let connector = WebSocketConnector::new().with_timeout(Duration::from_secs(2));
        let result = connector.connect("ws://127.0.0.1:1/socket", &[]).await;
        assert!(result.is_err());
    }
}
