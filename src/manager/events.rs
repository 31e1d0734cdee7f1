use crate::transport::CloseReason;
use crate::types::ConnectionStatus;
use crate::types::constants::lifecycle_events;

/// Connection lifecycle notification re-emitted by
/// [`RealtimeManager`](super::RealtimeManager).
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connected,
    Disconnected(CloseReason),
    Error(String),
    Status(ConnectionStatus),
}

impl LifecycleEvent {
    /// Event name handlers register under
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Connected => lifecycle_events::CONNECTED,
            LifecycleEvent::Disconnected(_) => lifecycle_events::DISCONNECTED,
            LifecycleEvent::Error(_) => lifecycle_events::ERROR,
            LifecycleEvent::Status(_) => lifecycle_events::STATUS,
        }
    }
}
