use crate::types::DEFAULT_MAX_RECONNECT_INTERVAL;
use rand::Rng;
use std::time::Duration;

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReconnectStrategy {
    /// Same delay before every attempt.
    #[default]
    Fixed,
    /// Delay doubles per attempt up to `max_interval`; `jitter` is the
    /// fraction (0.0..=1.0) of each delay that is randomized away.
    Exponential { max_interval: Duration, jitter: f64 },
}

impl ReconnectStrategy {
    pub fn exponential() -> Self {
        Self::Exponential {
            max_interval: Duration::from_millis(DEFAULT_MAX_RECONNECT_INTERVAL),
            jitter: 0.2,
        }
    }
}

/// Capped reconnect schedule for one outage.
///
/// `next_delay` hands out the delay for the next attempt until the cap is
/// reached; `reset` starts a new cycle after a successful open.
#[derive(Debug, Clone)]
pub struct ReconnectTimer {
    attempts: u32,
    max_attempts: u32,
    base: Duration,
    strategy: ReconnectStrategy,
}

impl ReconnectTimer {
    pub fn new(base: Duration, max_attempts: u32, strategy: ReconnectStrategy) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base,
            strategy,
        }
    }

    /// Attempts scheduled in the current cycle
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Get the next delay, or `None` once the attempt cap is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let delay = match &self.strategy {
            ReconnectStrategy::Fixed => self.base,
            ReconnectStrategy::Exponential {
                max_interval,
                jitter,
            } => {
                let factor = 2u32.saturating_pow(self.attempts);
                let capped = self.base.saturating_mul(factor).min(*max_interval);
                apply_jitter(capped, *jitter)
            }
        };

        self.attempts += 1;
        Some(delay)
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    let jitter = jitter.clamp(0.0, 1.0);
    if jitter == 0.0 {
        return delay;
    }
    let scale = 1.0 - rand::thread_rng().gen_range(0.0..=jitter);
    delay.mul_f64(scale)
}
