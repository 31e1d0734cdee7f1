// Manager module - Explicitly constructed owner of one transport and its channels
mod core;
mod events;
mod state;

pub use core::RealtimeManager;
pub use events::LifecycleEvent;
