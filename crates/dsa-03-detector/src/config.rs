//! Detector configuration.

use crate::error::DetectorError;
use crate::memo::DEFAULT_MEMO_CAPACITY;
use std::time::Duration;

pub const DEFAULT_TOPIC: &str = "dns-requests";
pub const DEFAULT_GROUP: &str = "dns-detectors";

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Topic holding admitted records.
    pub topic: String,
    /// Consumer group shared by all replicas.
    pub group: String,
    /// Empty-read timeout for one poll.
    pub poll_timeout: Duration,
    /// Extra Block attempts after the first failure.
    pub block_retries: u32,
    /// Backoff before the first retry; doubles per retry.
    pub retry_backoff: Duration,
    /// Upper bound on a single backoff.
    pub max_backoff: Duration,
    /// Group members run by one pool.
    pub replicas: usize,
    /// Capacity of the recently-blocked memo (0 disables it).
    pub memo_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            group: DEFAULT_GROUP.to_string(),
            poll_timeout: Duration::from_secs(1),
            block_retries: 3,
            retry_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            replicas: 1,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.topic.trim().is_empty() {
            return Err(DetectorError::Config("topic cannot be empty".into()));
        }
        if self.group.trim().is_empty() {
            return Err(DetectorError::Config("group cannot be empty".into()));
        }
        if self.poll_timeout.is_zero() {
            return Err(DetectorError::Config("poll_timeout cannot be 0".into()));
        }
        if self.replicas == 0 {
            return Err(DetectorError::Config("replicas must be at least 1".into()));
        }
        if self.max_backoff < self.retry_backoff {
            return Err(DetectorError::Config(
                "max_backoff cannot be smaller than retry_backoff".into(),
            ));
        }
        Ok(())
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.retry_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
