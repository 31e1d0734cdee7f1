use crate::transport::Subscription;

/// Mutable state for a [`Channel`](super::Channel)
#[derive(Debug, Default)]
pub struct ChannelState {
    /// Transport registration held while subscribed
    pub subscription: Option<Subscription>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}
