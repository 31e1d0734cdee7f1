use crate::messaging::emitter::guarded;
use crate::messaging::{EventEmitter, Handler, ListenerId};
use crate::types::constants::lifecycle_events;
use crate::types::{ConnectionStats, ConnectionStatus, Envelope};
use std::collections::VecDeque;
use tokio::sync::watch;

/// Consolidated mutable state for a transport worker.
///
/// Only the worker task touches this; handles observe it through the
/// `watch` channels.
pub struct TransportState {
    pub stats: ConnectionStats,

    /// Envelopes waiting for the next successful open, oldest first
    pub queue: VecDeque<Envelope>,

    status_tx: watch::Sender<ConnectionStatus>,
    stats_tx: watch::Sender<ConnectionStats>,
    status_listeners: EventEmitter<ConnectionStatus>,
}

impl TransportState {
    pub fn new(
        status_tx: watch::Sender<ConnectionStatus>,
        stats_tx: watch::Sender<ConnectionStats>,
    ) -> Self {
        Self {
            stats: ConnectionStats::default(),
            queue: VecDeque::new(),
            status_tx,
            stats_tx,
            status_listeners: EventEmitter::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.stats.status
    }

    /// Records a transition and notifies watchers. No-op when unchanged.
    pub fn set_status(&mut self, status: ConnectionStatus) {
        let previous = self.stats.status;
        if previous == status {
            return;
        }

        self.stats.status = status;
        tracing::debug!("Status {} -> {}", previous, status);

        self.status_tx.send_replace(status);
        self.publish_stats();
        self.status_listeners.emit(lifecycle_events::STATUS, &status);
    }

    /// Pushes the current stats to watchers
    pub fn publish_stats(&self) {
        self.stats_tx.send_replace(self.stats.clone());
    }

    /// Registers a status listener and invokes it with the current status
    pub fn add_status_listener(&self, id: ListenerId, listener: Handler<ConnectionStatus>) {
        let current = self.status();
        guarded(lifecycle_events::STATUS, || listener(&current));
        self.status_listeners
            .insert(lifecycle_events::STATUS, id, listener);
    }

    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        self.status_listeners.off(lifecycle_events::STATUS, id)
    }
}
