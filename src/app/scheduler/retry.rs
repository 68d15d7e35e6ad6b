//! Exponential backoff with jitter for per-granule retries

use std::time::Duration;

use super::config::SchedulerConfig;

/// Delay calculator for retry attempts
///
/// Attempt numbers are 1-based: `delay_for(1)` is the pause after the first
/// failed attempt. Jitter spreads simultaneous retries from multiple workers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl RetryPolicy {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            multiplier,
            jitter_factor,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.retry_base_delay,
            config.max_retry_delay,
            config.backoff_multiplier,
            config.jitter_factor,
        )
    }

    /// Delay to sleep after the given failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base_millis = self.base_delay.as_millis() as f64;
        let scaled = base_millis * self.multiplier.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_millis() as f64);

        // Jitter in [-jitter, +jitter] around the capped delay
        let jitter_range = capped * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            fastrand::f64() * 2.0 * jitter_range - jitter_range
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(base_ms: u64, max_ms: u64, multiplier: f64) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            multiplier,
            0.0,
        )
    }

    #[test]
    fn test_exponential_growth() {
        let policy = no_jitter(100, 60_000, 2.0);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = no_jitter(1000, 5000, 2.0);
        assert_eq!(policy.delay_for(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::new(
            Duration::from_millis(1000),
            Duration::from_secs(60),
            2.0,
            0.1,
        );
        for _ in 0..100 {
            let delay = policy.delay_for(1).as_millis() as i64;
            assert!((900..=1100).contains(&delay), "delay {} out of band", delay);
        }
    }
}
