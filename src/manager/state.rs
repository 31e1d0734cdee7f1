use crate::channel::Channel;
use crate::transport::{Subscription, Transport};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the manager owns between `initialize` and `disconnect`
pub struct Session {
    pub transport: Transport,

    /// Channels created so far, keyed by name
    pub channels: HashMap<String, Arc<Channel>>,

    /// Forwards transport status changes to manager listeners
    pub status_listener: Subscription,
}

impl Session {
    pub fn new(transport: Transport, status_listener: Subscription) -> Self {
        Self {
            transport,
            channels: HashMap::new(),
            status_listener,
        }
    }

    /// Memoized channel for `name`
    pub fn channel(&mut self, name: &str) -> Arc<Channel> {
        let transport = &self.transport;
        Arc::clone(
            self.channels
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Channel::new(name, transport.clone()))),
        )
    }
}
