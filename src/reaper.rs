//! Stale-claim recovery.
//!
//! A crash or forced shutdown can leave jobs in `Active` with no worker
//! attached. The reaper periodically finds active jobs whose claim is
//! older than the staleness threshold and treats each as a failed
//! delivery attempt: the job re-enters the normal retry/backoff path,
//! or becomes `Failed` if its attempts are exhausted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::backend::{Backend, SharedBackend};
use crate::backoff::BackoffPolicy;
use crate::error::{Result, SpoolError};
use crate::job::now_millis;

/// Reaper that reclaims jobs stuck in `Active`.
pub struct Reaper {
    backend: SharedBackend,
    backoff: BackoffPolicy,
    interval: Duration,
    stale_threshold: Duration,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl Reaper {
    /// Create a new reaper. `stop` wakes the loop when the pool shuts
    /// down, so stopping does not wait out a full sweep interval.
    pub fn new(
        backend: SharedBackend,
        backoff: BackoffPolicy,
        interval: Duration,
        stale_threshold: Duration,
        running: Arc<AtomicBool>,
        stop: Arc<Notify>,
    ) -> Self {
        Self {
            backend,
            backoff,
            interval,
            stale_threshold,
            running,
            stop,
        }
    }

    /// Run the sweep loop.
    pub async fn run(&self) -> Result<()> {
        tracing::debug!("Reaper started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.stop.notified() => break,
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "Stale-claim sweep failed");
            }
        }

        tracing::debug!("Reaper stopped");
        Ok(())
    }

    /// One sweep: reclaim every active job whose claim has gone stale.
    async fn sweep(&self) -> Result<()> {
        let now = now_millis();
        let cutoff = now - self.stale_threshold.as_millis() as i64;
        let stale = self.backend.stale_active(cutoff).await?;

        if stale.is_empty() {
            return Ok(());
        }

        tracing::info!(count = stale.len(), "Found stale active jobs to reclaim");

        for job in stale {
            let reason = format!(
                "claim expired; holder {}",
                job.claimed_by.as_deref().unwrap_or("unknown")
            );
            let delay = self.backoff.delay_for(job.attempt_count);
            match self
                .backend
                .reschedule(&job.id, delay, now, Some(reason))
                .await
            {
                Ok(state) => {
                    tracing::info!(
                        job_id = %job.id,
                        attempt = job.attempt_count,
                        state = %state,
                        "Reclaimed stale job"
                    );
                }
                // The holder finished between the snapshot and here.
                Err(SpoolError::InvalidState { .. }) | Err(SpoolError::NotFound(_)) => {
                    tracing::debug!(job_id = %job.id, "Stale job already resolved");
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to reclaim stale job");
                }
            }
        }

        Ok(())
    }
}
