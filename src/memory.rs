//! In-process backend with atomic claim semantics.
//!
//! Suitable for a single logical queue instance. All operations take a
//! brief store-wide lock and never hold it across an await point, so the
//! claim path stays the sole synchronization point and the read path
//! never blocks job processing for long.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::Backend;
use crate::config::QueueConfig;
use crate::error::{Result, SpoolError};
use crate::job::{now_millis, Job, JobId, JobState};
use crate::status::QueueCounts;

/// In-memory job store with bounded terminal-job retention.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    keep_completed: usize,
    keep_failed: usize,
}

struct Inner {
    jobs: HashMap<JobId, Job>,
    next_sequence: u64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a store with the default retention bounds (100 completed,
    /// 50 failed).
    pub fn new() -> Self {
        let defaults = QueueConfig::default();
        Self::with_retention(defaults.keep_completed, defaults.keep_failed)
    }

    /// Create a store with retention bounds taken from `config`.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::with_retention(config.keep_completed, config.keep_failed)
    }

    /// Create a store with explicit retention bounds.
    pub fn with_retention(keep_completed: usize, keep_failed: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                next_sequence: 0,
            }),
            keep_completed,
            keep_failed,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| SpoolError::Unavailable("store lock poisoned".to_string()))
    }

    /// Drop the oldest terminal jobs of `state` beyond `cap`.
    fn evict_over_cap(inner: &mut Inner, state: JobState, cap: usize) {
        let mut terminal: Vec<(i64, u64, JobId)> = inner
            .jobs
            .values()
            .filter(|j| j.state == state)
            .map(|j| (j.finished_at.unwrap_or(j.enqueued_at), j.sequence, j.id.clone()))
            .collect();
        if terminal.len() <= cap {
            return;
        }
        terminal.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let excess = terminal.len() - cap;
        for (_, _, id) in terminal.into_iter().take(excess) {
            inner.jobs.remove(&id);
            tracing::debug!(job_id = %id, state = %state, "Evicted terminal job past retention bound");
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn insert(&self, mut job: Job) -> Result<()> {
        let mut inner = self.lock()?;
        job.sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn claim_next(&self, now: i64, claimant: &str) -> Result<Option<Job>> {
        let mut inner = self.lock()?;
        let candidate = inner
            .jobs
            .values()
            .filter(|j| j.eligible(now))
            .min_by_key(|j| (j.priority, j.sequence))
            .map(|j| j.id.clone());

        let id = match candidate {
            Some(id) => id,
            None => return Ok(None),
        };

        // Still under the lock, so the transition is atomic with the
        // selection above.
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| SpoolError::NotFound(id.clone()))?;
        job.state = JobState::Active;
        job.attempt_count += 1;
        job.claimed_at = Some(now);
        job.claimed_by = Some(claimant.to_string());
        Ok(Some(job.clone()))
    }

    async fn mark_done(&self, id: &JobId, now: i64) -> Result<()> {
        let mut inner = self.lock()?;
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| SpoolError::NotFound(id.clone()))?;
        if job.state != JobState::Active {
            return Err(SpoolError::InvalidState {
                id: id.clone(),
                expected: JobState::Active,
                actual: job.state,
            });
        }
        job.state = JobState::Completed;
        job.finished_at = Some(now);
        job.claimed_at = None;
        job.claimed_by = None;
        Self::evict_over_cap(&mut inner, JobState::Completed, self.keep_completed);
        Ok(())
    }

    async fn reschedule(
        &self,
        id: &JobId,
        delay: Duration,
        now: i64,
        error: Option<String>,
    ) -> Result<JobState> {
        let mut inner = self.lock()?;
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| SpoolError::NotFound(id.clone()))?;
        if job.state != JobState::Active {
            return Err(SpoolError::InvalidState {
                id: id.clone(),
                expected: JobState::Active,
                actual: job.state,
            });
        }
        if error.is_some() {
            job.last_error = error;
        }
        job.claimed_at = None;
        job.claimed_by = None;

        let state = if job.can_retry() {
            job.state = JobState::Delayed;
            let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
            job.not_before = now.saturating_add(delay_ms);
            JobState::Delayed
        } else {
            job.state = JobState::Failed;
            job.finished_at = Some(now);
            JobState::Failed
        };
        if state == JobState::Failed {
            Self::evict_over_cap(&mut inner, JobState::Failed, self.keep_failed);
        }
        Ok(state)
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let inner = self.lock()?;
        let now = now_millis();
        let mut counts = QueueCounts::default();
        for job in inner.jobs.values() {
            match job.state {
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
                // Delayed is a sub-case of waiting; bucket by whether
                // `not_before` has passed, not by the stored tag.
                JobState::Waiting | JobState::Delayed => {
                    if job.not_before > now {
                        counts.delayed += 1;
                    } else {
                        counts.waiting += 1;
                    }
                }
            }
        }
        Ok(counts)
    }

    async fn stale_active(&self, cutoff: i64) -> Result<Vec<Job>> {
        let inner = self.lock()?;
        Ok(inner
            .jobs
            .values()
            .filter(|j| j.state == JobState::Active && j.claimed_at.is_some_and(|t| t <= cutoff))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        let inner = self.lock()?;
        Ok(inner.jobs.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{EmailContext, EmailPayload};

    fn payload(to: &str) -> EmailPayload {
        EmailPayload {
            to: to.to_string(),
            subject: "s".to_string(),
            html: "<p>b</p>".to_string(),
            user_id: "u".to_string(),
            organization_id: None,
            reference_id: None,
            context: EmailContext::MessageReceived,
        }
    }

    fn job(priority: u8, delay_ms: u64, max_attempts: u32, now: i64) -> Job {
        Job::new(
            payload("a@b.c"),
            priority,
            Duration::from_millis(delay_ms),
            max_attempts,
            now,
        )
    }

    #[tokio::test]
    async fn test_claim_prefers_lowest_priority_value() {
        let store = MemoryBackend::new();
        let high = job(0, 0, 3, 0);
        let low = job(5, 0, 3, 0);
        store.insert(low.clone()).await.unwrap();
        store.insert(high.clone()).await.unwrap();

        let claimed = store.claim_next(10, "w").await.unwrap().unwrap();
        assert_eq!(claimed.id, high.id);
    }

    #[tokio::test]
    async fn test_claim_is_fifo_within_priority() {
        let store = MemoryBackend::new();
        let first = job(5, 0, 3, 0);
        let second = job(5, 0, 3, 0);
        store.insert(first.clone()).await.unwrap();
        store.insert(second.clone()).await.unwrap();

        let a = store.claim_next(10, "w").await.unwrap().unwrap();
        let b = store.claim_next(10, "w").await.unwrap().unwrap();
        assert_eq!(a.id, first.id);
        assert_eq!(b.id, second.id);
    }

    #[tokio::test]
    async fn test_claim_increments_attempts_and_stamps_holder() {
        let store = MemoryBackend::new();
        let j = job(0, 0, 3, 0);
        store.insert(j.clone()).await.unwrap();

        let claimed = store.claim_next(50, "worker-7").await.unwrap().unwrap();
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempt_count, 1);
        assert_eq!(claimed.claimed_at, Some(50));
        assert_eq!(claimed.claimed_by.as_deref(), Some("worker-7"));
    }

    #[tokio::test]
    async fn test_delayed_job_not_claimable_before_not_before() {
        let store = MemoryBackend::new();
        let j = job(0, 60_000, 3, 0);
        store.insert(j.clone()).await.unwrap();

        assert!(store.claim_next(59_999, "w").await.unwrap().is_none());
        let claimed = store.claim_next(60_000, "w").await.unwrap().unwrap();
        assert_eq!(claimed.id, j.id);
    }

    #[tokio::test]
    async fn test_mark_done_requires_active() {
        let store = MemoryBackend::new();
        let j = job(0, 0, 3, 0);
        let id = j.id.clone();
        store.insert(j).await.unwrap();

        let err = store.mark_done(&id, 1).await.unwrap_err();
        assert!(matches!(err, SpoolError::InvalidState { .. }));

        store.claim_next(1, "w").await.unwrap().unwrap();
        store.mark_done(&id, 2).await.unwrap();
        let done = store.get(&id).await.unwrap().unwrap();
        assert_eq!(done.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_mark_done_unknown_id_is_not_found() {
        let store = MemoryBackend::new();
        let err = store.mark_done(&JobId::new(), 0).await.unwrap_err();
        assert!(matches!(err, SpoolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reschedule_delays_while_attempts_remain() {
        let store = MemoryBackend::new();
        let j = job(0, 0, 3, 0);
        let id = j.id.clone();
        store.insert(j).await.unwrap();
        store.claim_next(0, "w").await.unwrap().unwrap();

        let state = store
            .reschedule(&id, Duration::from_millis(5_000), 100, Some("boom".into()))
            .await
            .unwrap();
        assert_eq!(state, JobState::Delayed);

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.not_before, 5_100);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
        assert!(stored.claimed_by.is_none());
    }

    #[tokio::test]
    async fn test_reschedule_fails_job_when_attempts_exhausted() {
        let store = MemoryBackend::new();
        let j = job(0, 0, 1, 0);
        let id = j.id.clone();
        store.insert(j).await.unwrap();
        store.claim_next(0, "w").await.unwrap().unwrap();

        let state = store
            .reschedule(&id, Duration::from_millis(5_000), 100, Some("boom".into()))
            .await
            .unwrap();
        assert_eq!(state, JobState::Failed);
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.finished_at, Some(100));
    }

    #[tokio::test]
    async fn test_counts_buckets_delayed_dynamically() {
        let store = MemoryBackend::new();
        let now = now_millis();
        // Stored as Delayed but already eligible: counts as waiting.
        let mut eligible = job(0, 1, 3, now - 10_000);
        eligible.state = JobState::Delayed;
        store.insert(eligible).await.unwrap();
        // Genuinely in the future: counts as delayed.
        store.insert(job(0, 60_000, 3, now)).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.delayed, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_completed_retention_evicts_oldest_first() {
        let store = MemoryBackend::with_retention(2, 50);
        let mut ids = Vec::new();
        for i in 0..4 {
            let j = job(0, 0, 3, i);
            ids.push(j.id.clone());
            store.insert(j).await.unwrap();
        }
        for (i, id) in ids.iter().enumerate() {
            store.claim_next(100, "w").await.unwrap().unwrap();
            store.mark_done(id, 200 + i as i64).await.unwrap();
        }

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.completed, 2);
        // The two oldest completions are gone.
        assert!(store.get(&ids[0]).await.unwrap().is_none());
        assert!(store.get(&ids[1]).await.unwrap().is_none());
        assert!(store.get(&ids[3]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_active_filters_by_claim_age() {
        let store = MemoryBackend::new();
        let j = job(0, 0, 3, 0);
        let id = j.id.clone();
        store.insert(j).await.unwrap();
        store.claim_next(1_000, "w").await.unwrap().unwrap();

        assert!(store.stale_active(999).await.unwrap().is_empty());
        let stale = store.stale_active(1_000).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, id);
    }
}
