use std::time::Duration;

/// FIFO or LIFO ordering by `queuedAt`, with `id` as tiebreaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingMode {
    Fifo,
    Lifo,
}

/// What happens to a message that exhausts `maxAttempts` on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStrategy {
    Retry,
    DeadLetter,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub max_attempts: u32,
    pub concurrency: usize,
    pub auto_start: bool,
    pub ordering_mode: OrderingMode,
    pub ordering_guarantee: bool,
    pub ordering_lock_ttl: Duration,
    pub failure_strategy: FailureStrategy,
    pub lock_ttl: Duration,
    pub heartbeat_ttl: Duration,
    pub ticket_batch_size: usize,
    pub dispatch_interval: Duration,
    pub poll_batch_size: usize,
    pub recovery_interval: Duration,
    pub processed_cache_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            visibility_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(30),
            max_attempts: 3,
            concurrency: 5,
            auto_start: true,
            ordering_mode: OrderingMode::Fifo,
            ordering_guarantee: false,
            ordering_lock_ttl: Duration::from_millis(250),
            failure_strategy: FailureStrategy::Retry,
            lock_ttl: Duration::from_secs(10),
            heartbeat_ttl: Duration::from_secs(30),
            ticket_batch_size: 50,
            dispatch_interval: Duration::from_secs(2),
            poll_batch_size: 50,
            recovery_interval: Duration::from_secs(15),
            processed_cache_ttl: Duration::from_secs(60),
        }
    }
}

impl QueueConfig {
    /// Ticket TTL is `max(30s, 2 * visibilityTimeout)`.
    pub fn ticket_ttl(&self) -> Duration {
        std::cmp::max(Duration::from_secs(30), self.visibility_timeout * 2)
    }

    pub fn validate(&self) -> Result<(), crate::error::QueueError> {
        if self.failure_strategy == FailureStrategy::DeadLetter && self.max_attempts == 0 {
            return Err(crate::error::QueueError::Configuration(
                "dead-letter strategy requires maxAttempts >= 1".to_string(),
            ));
        }
        if self.ordering_lock_ttl < Duration::from_millis(250) {
            return Err(crate::error::QueueError::Configuration(
                "orderingLockTTL must be at least 250ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff capped at 30s: `min(2^attempts * 1000, 30000)` ms.
pub fn retry_backoff(attempts: u32) -> Duration {
    let millis = 2u64.saturating_pow(attempts).saturating_mul(1000).min(30_000);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_30_seconds() {
        assert_eq!(retry_backoff(0), Duration::from_millis(1000));
        assert_eq!(retry_backoff(4), Duration::from_millis(16_000));
        assert_eq!(retry_backoff(10), Duration::from_millis(30_000));
    }

    #[test]
    fn dead_letter_without_attempts_is_invalid() {
        let cfg = QueueConfig { failure_strategy: FailureStrategy::DeadLetter, max_attempts: 0, ..QueueConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ticket_ttl_is_at_least_30s() {
        let cfg = QueueConfig { visibility_timeout: Duration::from_secs(1), ..QueueConfig::default() };
        assert_eq!(cfg.ticket_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn ticket_ttl_scales_with_visibility_timeout() {
        let cfg = QueueConfig { visibility_timeout: Duration::from_secs(60), ..QueueConfig::default() };
        assert_eq!(cfg.ticket_ttl(), Duration::from_secs(120));
    }
}
