//! Worker slot: claim-and-process loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::backend::{Backend, SharedBackend};
use crate::backoff::BackoffPolicy;
use crate::error::Result;
use crate::job::{now_millis, Job, JobState};
use crate::mailer::{DeliveryLog, DeliveryOutcome, Mailer};

/// One execution slot in the worker pool.
///
/// Repeatedly claims the next eligible job and runs the delivery
/// pipeline: send, then mark done or reschedule with backoff, then
/// record the outcome. The worker blocks only on the transport and the
/// audit log; it never holds a store lock across its own I/O.
pub struct Worker {
    id: usize,
    claimant: String,
    backend: SharedBackend,
    mailer: Arc<dyn Mailer>,
    log: Arc<dyn DeliveryLog>,
    backoff: BackoffPolicy,
    poll_interval: Duration,
    delivery_timeout: Duration,
    running: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    in_progress: Arc<AtomicUsize>,
    drain_notify: Arc<Notify>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        claimant: String,
        backend: SharedBackend,
        mailer: Arc<dyn Mailer>,
        log: Arc<dyn DeliveryLog>,
        backoff: BackoffPolicy,
        poll_interval: Duration,
        delivery_timeout: Duration,
        running: Arc<AtomicBool>,
        draining: Arc<AtomicBool>,
        in_progress: Arc<AtomicUsize>,
        drain_notify: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            claimant,
            backend,
            mailer,
            log,
            backoff,
            poll_interval,
            delivery_timeout,
            running,
            draining,
            in_progress,
            drain_notify,
        }
    }

    /// Run the claim loop until the pool stops or starts draining.
    pub async fn run(&self) -> Result<()> {
        tracing::debug!(worker_id = self.id, "Worker started");

        while self.running.load(Ordering::SeqCst) {
            if self.draining.load(Ordering::SeqCst) {
                tracing::debug!(worker_id = self.id, "Worker draining, stopping claims");
                break;
            }

            match self.claim_and_process().await {
                Ok(true) => {
                    // Job processed, claim again immediately.
                }
                Ok(false) => {
                    // Nothing eligible; wait a bounded interval.
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "Worker error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        tracing::debug!(worker_id = self.id, "Worker stopped");
        Ok(())
    }

    /// Claim one job and run it through the pipeline. Returns `false`
    /// when no job was eligible.
    async fn claim_and_process(&self) -> Result<bool> {
        let job = match self.backend.claim_next(now_millis(), &self.claimant).await? {
            Some(job) => job,
            None => return Ok(false),
        };

        self.in_progress.fetch_add(1, Ordering::SeqCst);
        let result = self.process(&job).await;
        self.in_progress.fetch_sub(1, Ordering::SeqCst);
        self.drain_notify.notify_one();

        result.map(|()| true)
    }

    async fn process(&self, job: &Job) -> Result<()> {
        tracing::debug!(
            worker_id = self.id,
            job_id = %job.id,
            attempt = job.attempt_count,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        let sent = tokio::time::timeout(self.delivery_timeout, self.mailer.send(&job.payload)).await;
        let failure = match sent {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.message().to_string()),
            Err(_) => Some(format!(
                "delivery timed out after {}ms",
                self.delivery_timeout.as_millis()
            )),
        };

        match failure {
            None => {
                self.backend.mark_done(&job.id, now_millis()).await?;
                tracing::debug!(worker_id = self.id, job_id = %job.id, "Job completed");
                self.record(job, DeliveryOutcome::Sent, None).await;
            }
            Some(reason) => {
                // The attempt just made is attempt_count; it sets the
                // backoff for the next one.
                let delay = self.backoff.delay_for(job.attempt_count);
                let state = self
                    .backend
                    .reschedule(&job.id, delay, now_millis(), Some(reason.clone()))
                    .await?;

                let outcome = if state == JobState::Failed {
                    tracing::warn!(
                        worker_id = self.id,
                        job_id = %job.id,
                        attempts = job.attempt_count,
                        error = %reason,
                        "Job failed, attempts exhausted"
                    );
                    DeliveryOutcome::Failed
                } else {
                    tracing::debug!(
                        worker_id = self.id,
                        job_id = %job.id,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Job rescheduled for retry"
                    );
                    DeliveryOutcome::Retried
                };
                self.record(job, outcome, Some(&reason)).await;
            }
        }

        Ok(())
    }

    /// Best-effort audit record; failures never alter job state.
    async fn record(&self, job: &Job, outcome: DeliveryOutcome, error: Option<&str>) {
        if let Err(e) = self.log.record(job, outcome, error).await {
            tracing::warn!(
                worker_id = self.id,
                job_id = %job.id,
                error = %e,
                "Failed to record delivery outcome"
            );
        }
    }
}
