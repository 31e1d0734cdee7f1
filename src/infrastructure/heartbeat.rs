use crate::types::message::{Envelope, now_ms};
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Outcome of a heartbeat tick
#[derive(Debug, Clone, PartialEq)]
pub enum Beat {
    /// Send this ping
    Ping(Envelope),
    /// The previous ping was never answered
    Missed,
}

/// Periodic ping schedule for one connection.
///
/// Started when the transport reaches `connected` and stopped on any
/// transition out of it. Owned by the transport worker, which polls
/// [`Heartbeat::tick`] alongside socket reads.
pub struct Heartbeat {
    period: Duration,
    detect_missed: bool,
    interval: Option<Interval>,
    pending: Option<i64>,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            detect_missed: false,
            interval: None,
            pending: None,
        }
    }

    /// Report a [`Beat::Missed`] when a tick finds the previous ping unanswered.
    pub fn with_missed_detection(mut self, enabled: bool) -> Self {
        self.detect_missed = enabled;
        self
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// First ping goes out one full period after the start.
    pub fn start(&mut self) {
        if self.period.is_zero() {
            tracing::debug!("Heartbeat disabled (zero interval)");
            return;
        }
        let mut interval = time::interval_at(time::Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
        self.pending = None;
    }

    pub fn stop(&mut self) {
        self.interval = None;
        self.pending = None;
    }

    /// Waits for the next beat. Never resolves while stopped.
    pub async fn tick(&mut self) -> Beat {
        let Some(interval) = self.interval.as_mut() else {
            return std::future::pending().await;
        };
        interval.tick().await;

        if self.detect_missed && self.pending.is_some() {
            tracing::warn!("[Heartbeat] Previous ping unanswered");
            return Beat::Missed;
        }

        let sent_at = now_ms();
        self.pending = Some(sent_at);
        tracing::debug!("Sending heartbeat at {}", sent_at);
        Beat::Ping(Envelope::ping(sent_at))
    }

    /// Latency in millis measured from a pong echoing the ping's timestamp.
    pub fn acknowledge(&mut self, pong: &Envelope, received_at: i64) -> Option<i64> {
        self.pending = None;
        let sent_at = pong.payload.get("timestamp").and_then(|t| t.as_i64())?;
        Some(received_at - sent_at)
    }
}
