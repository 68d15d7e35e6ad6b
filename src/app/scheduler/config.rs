//! Scheduler configuration and validation

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{limits, workers};
use crate::errors::ConfigError;

/// Configuration for the acquisition scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of concurrent transfer workers (each holds one session)
    pub worker_count: usize,
    /// Attempts per granule before giving up, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// Upper bound on any single retry delay
    #[serde(with = "humantime_serde")]
    pub max_retry_delay: Duration,
    /// Exponential growth factor between retries
    pub backoff_multiplier: f64,
    /// Randomization factor applied to each delay (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            max_attempts: limits::MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            max_retry_delay: Duration::from_secs(limits::MAX_BACKOFF_SECS),
            backoff_multiplier: limits::BACKOFF_MULTIPLIER,
            jitter_factor: limits::BACKOFF_JITTER_FACTOR,
        }
    }
}

impl SchedulerConfig {
    /// Fast preset for tests: one worker, millisecond delays
    pub fn testing() -> Self {
        Self {
            worker_count: 1,
            max_attempts: limits::MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.worker_count".to_string(),
                value: self.worker_count.to_string(),
                reason: format!("must be between 1 and {}", workers::MAX_WORKER_COUNT),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.max_attempts".to_string(),
                value: self.max_attempts.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.jitter_factor".to_string(),
                value: self.jitter_factor.to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.backoff_multiplier".to_string(),
                value: self.backoff_multiplier.to_string(),
                reason: "must be at least 1.0".to_string(),
            });
        }
        Ok(())
    }
}
