// Module declarations
mod core;
mod state;

// Public API exports
pub use core::Channel;
pub use state::ChannelState;
