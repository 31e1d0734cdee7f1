// Messaging module - Event distribution and message routing
pub mod emitter;
pub mod event;
pub mod router;

pub use emitter::{EventEmitter, Handler, Listener, ListenerId};
pub use event::MessageType;
pub use router::MessageRouter;
