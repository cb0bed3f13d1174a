//! Configuration for the queue, the worker pool, and retention.

use std::time::Duration;

use crate::backoff::DEFAULT_BACKOFF_BASE;

/// Configuration shared by the client, the worker pool, and the store.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of concurrent worker slots.
    pub concurrency: usize,
    /// How long an idle worker sleeps before re-checking for work.
    pub poll_interval: Duration,
    /// Upper bound on a single delivery attempt; a timeout counts as a
    /// delivery failure and follows the normal retry path.
    pub delivery_timeout: Duration,
    /// Default `max_attempts` when the caller does not override it.
    pub default_max_attempts: u32,
    /// Base delay for exponential retry backoff (pool-wide constant).
    pub backoff_base: Duration,
    /// How many completed jobs to retain before evicting oldest first.
    pub keep_completed: usize,
    /// How many failed jobs to retain before evicting oldest first.
    pub keep_failed: usize,
    /// Interval between stale-claim sweeps.
    pub reaper_interval: Duration,
    /// An active job with no progress past this age is reclaimable.
    pub stale_threshold: Duration,
    /// Graceful shutdown deadline for in-flight attempts.
    pub shutdown_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_millis(100),
            delivery_timeout: Duration::from_secs(30),
            default_max_attempts: 3,
            backoff_base: DEFAULT_BACKOFF_BASE,
            keep_completed: 100,
            keep_failed: 50,
            reaper_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Create a new builder.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::new()
    }
}

/// Builder for [`QueueConfig`].
#[derive(Debug, Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of concurrent worker slots.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    /// Set the idle poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the per-attempt delivery timeout.
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    /// Set the default number of delivery attempts.
    pub fn default_max_attempts(mut self, attempts: u32) -> Self {
        self.config.default_max_attempts = attempts;
        self
    }

    /// Set the backoff base delay.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base = base;
        self
    }

    /// Set the completed-job retention bound.
    pub fn keep_completed(mut self, n: usize) -> Self {
        self.config.keep_completed = n;
        self
    }

    /// Set the failed-job retention bound.
    pub fn keep_failed(mut self, n: usize) -> Self {
        self.config.keep_failed = n;
        self
    }

    /// Set the stale-claim sweep interval.
    pub fn reaper_interval(mut self, interval: Duration) -> Self {
        self.config.reaper_interval = interval;
        self
    }

    /// Set the staleness threshold for active jobs.
    pub fn stale_threshold(mut self, threshold: Duration) -> Self {
        self.config.stale_threshold = threshold;
        self
    }

    /// Set the graceful shutdown deadline.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Build the QueueConfig.
    pub fn build(self) -> QueueConfig {
        self.config
    }
}
