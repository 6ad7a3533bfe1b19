/*
[INPUT]:  Backoff configuration (initial/max delay, multiplier, jitter, attempt cap)
[OUTPUT]: Successive wait durations for retries and reconnects
[POS]:    Shared policy - used by REST retries and WebSocket reconnection
[UPDATE]: When changing backoff curve or jitter behavior
*/

use std::time::Duration;

use rand::Rng;

/// Exponential backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after each attempt
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%)
    pub jitter_factor: f64,
    /// Maximum number of delays handed out (0 = unlimited)
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Stateful backoff sequence
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Next delay, or `None` once the attempt cap is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }
        self.attempt_count += 1;

        let delay = self.apply_jitter(self.current_delay);

        let max_millis = u64::try_from(self.config.max_delay.as_millis()).unwrap_or(u64::MAX);
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            (scaled as u64).min(max_millis)
        } else {
            0
        };
        self.current_delay = Duration::from_millis(next_millis);

        Some(delay.min(self.config.max_delay))
    }

    /// Start over after a success
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        let base_millis = duration.as_millis() as f64;
        let range = base_millis * self.config.jitter_factor;
        let jitter = rand::thread_rng().gen_range(-range..=range);
        Duration::from_millis((base_millis + jitter).max(1.0).round() as u64)
    }
}
