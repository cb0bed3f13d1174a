//! Backend abstraction for durable job storage.
//!
//! The trait defines the queue's storage contract: admission, atomic
//! claim, state transitions, and aggregate counts. Implementations must
//! be thread-safe and must guarantee that two concurrent `claim_next`
//! calls never return the same job.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::job::{Job, JobId, JobState};
use crate::status::QueueCounts;

/// Storage operations backing the job queue.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Persist a newly admitted job.
    ///
    /// Either the job is fully stored or the call fails with
    /// `SpoolError::Unavailable` and no partial mutation remains. The
    /// store assigns the job's admission `sequence`.
    async fn insert(&self, job: Job) -> Result<()>;

    /// Atomically claim the next eligible job.
    ///
    /// Among jobs in `Waiting`/`Delayed` with `not_before <= now`,
    /// selects the lowest priority value, tie-broken by earliest
    /// admission; transitions it to `Active`, increments its attempt
    /// count, and stamps `claimed_at`/`claimed_by`. Returns `None` when
    /// no job is eligible.
    async fn claim_next(&self, now: i64, claimant: &str) -> Result<Option<Job>>;

    /// Transition an `Active` job to `Completed`.
    ///
    /// Fails with `NotFound` or `InvalidState` if the job is missing or
    /// not currently `Active`. May evict the oldest retained completed
    /// jobs past the retention bound.
    async fn mark_done(&self, id: &JobId, now: i64) -> Result<()>;

    /// Record a failed attempt on an `Active` job.
    ///
    /// If attempts remain, the job returns to `Delayed` with
    /// `not_before = now + delay`; otherwise it becomes `Failed`.
    /// Returns the resulting state so the caller can log accordingly.
    async fn reschedule(
        &self,
        id: &JobId,
        delay: Duration,
        now: i64,
        error: Option<String>,
    ) -> Result<JobState>;

    /// Snapshot job counts per state.
    async fn counts(&self) -> Result<QueueCounts>;

    /// List `Active` jobs claimed at or before `cutoff` (unix millis).
    ///
    /// Feeds the stale-claim sweep: such jobs are treated as if their
    /// delivery attempt failed.
    async fn stale_active(&self, cutoff: i64) -> Result<Vec<Job>>;

    /// Look up a job by id.
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;
}

/// A type-erased backend that can be shared across tasks.
pub type DynBackend = Arc<dyn Backend>;

/// Wrapper around `Arc<dyn Backend>` for convenience.
#[derive(Clone)]
pub struct SharedBackend {
    inner: DynBackend,
}

impl SharedBackend {
    /// Create a new SharedBackend from any Backend implementation.
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// Get a reference to the inner backend.
    pub fn inner(&self) -> &DynBackend {
        &self.inner
    }
}

#[async_trait]
impl Backend for SharedBackend {
    async fn insert(&self, job: Job) -> Result<()> {
        self.inner.insert(job).await
    }

    async fn claim_next(&self, now: i64, claimant: &str) -> Result<Option<Job>> {
        self.inner.claim_next(now, claimant).await
    }

    async fn mark_done(&self, id: &JobId, now: i64) -> Result<()> {
        self.inner.mark_done(id, now).await
    }

    async fn reschedule(
        &self,
        id: &JobId,
        delay: Duration,
        now: i64,
        error: Option<String>,
    ) -> Result<JobState> {
        self.inner.reschedule(id, delay, now, error).await
    }

    async fn counts(&self) -> Result<QueueCounts> {
        self.inner.counts().await
    }

    async fn stale_active(&self, cutoff: i64) -> Result<Vec<Job>> {
        self.inner.stale_active(cutoff).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        self.inner.get(id).await
    }
}
