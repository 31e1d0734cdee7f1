// Infrastructure module - Timers driving the transport worker
pub mod heartbeat;
pub mod timer;

pub use heartbeat::{Beat, Heartbeat};
pub use timer::{ReconnectStrategy, ReconnectTimer};
