//! Worker pool: a fixed number of concurrent execution slots plus the
//! stale-claim reaper, with graceful drain-then-stop shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;

use crate::backend::{Backend, SharedBackend};
use crate::backoff::BackoffPolicy;
use crate::config::QueueConfig;
use crate::error::{Result, SpoolError};
use crate::mailer::{DeliveryLog, Mailer, TracingLog};
use crate::reaper::Reaper;
use crate::worker::Worker;

/// Builder for [`WorkerPool`].
#[derive(Default)]
pub struct WorkerPoolBuilder {
    config: QueueConfig,
    backend: Option<SharedBackend>,
    mailer: Option<Arc<dyn Mailer>>,
    log: Option<Arc<dyn DeliveryLog>>,
}

impl WorkerPoolBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the full configuration.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the backing store.
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(SharedBackend::new(backend));
        self
    }

    /// Set an already-shared backing store.
    pub fn shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the delivery transport.
    pub fn mailer(mut self, mailer: impl Mailer + 'static) -> Self {
        self.mailer = Some(Arc::new(mailer));
        self
    }

    /// Set the audit logger. Defaults to [`TracingLog`].
    pub fn delivery_log(mut self, log: impl DeliveryLog + 'static) -> Self {
        self.log = Some(Arc::new(log));
        self
    }

    /// Build the WorkerPool.
    pub fn build(self) -> Result<WorkerPool> {
        let backend = self
            .backend
            .ok_or_else(|| SpoolError::Config("Backend is required".to_string()))?;
        let mailer = self
            .mailer
            .ok_or_else(|| SpoolError::Config("Mailer is required".to_string()))?;
        let log = self.log.unwrap_or_else(|| Arc::new(TracingLog));
        Ok(WorkerPool::new(self.config, backend, mailer, log))
    }
}

/// Pool of concurrent worker slots processing the queue.
pub struct WorkerPool {
    config: QueueConfig,
    backend: SharedBackend,
    mailer: Arc<dyn Mailer>,
    log: Arc<dyn DeliveryLog>,
    pool_id: String,
    running: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    in_progress: Arc<AtomicUsize>,
    drain_notify: Arc<Notify>,
    stop_notify: Arc<Notify>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("pool_id", &self.pool_id)
            .field("running", &self.running)
            .field("draining", &self.draining)
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Create a new builder.
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::new()
    }

    /// Create a pool from parts.
    pub fn new(
        config: QueueConfig,
        backend: SharedBackend,
        mailer: Arc<dyn Mailer>,
        log: Arc<dyn DeliveryLog>,
    ) -> Self {
        Self {
            config,
            backend,
            mailer,
            log,
            pool_id: generate_pool_id(),
            running: Arc::new(AtomicBool::new(false)),
            draining: Arc::new(AtomicBool::new(false)),
            in_progress: Arc::new(AtomicUsize::new(0)),
            drain_notify: Arc::new(Notify::new()),
            stop_notify: Arc::new(Notify::new()),
        }
    }

    /// Get the pool id.
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// Run the pool until ctrl-c, then drain and stop.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
    }

    /// Run the pool until the provided shutdown future completes, then
    /// drain in-flight attempts and stop.
    ///
    /// Spawns the reaper and one task per worker slot. Jobs still
    /// `Active` after a forced stop are reclaimed by a later reaper
    /// sweep once their claims go stale.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        self.running.store(true, Ordering::SeqCst);

        let mut tasks = JoinSet::new();

        let reaper = Reaper::new(
            self.backend.clone(),
            BackoffPolicy::new(self.config.backoff_base),
            self.config.reaper_interval,
            self.config.stale_threshold,
            self.running.clone(),
            self.stop_notify.clone(),
        );
        tasks.spawn(async move { reaper.run().await });

        for worker_id in 0..self.config.concurrency {
            let worker = Worker::new(
                worker_id,
                format!("{}/{}", self.pool_id, worker_id),
                self.backend.clone(),
                self.mailer.clone(),
                self.log.clone(),
                BackoffPolicy::new(self.config.backoff_base),
                self.config.poll_interval,
                self.config.delivery_timeout,
                self.running.clone(),
                self.draining.clone(),
                self.in_progress.clone(),
                self.drain_notify.clone(),
            );
            tasks.spawn(async move { worker.run().await });
        }

        tracing::info!(
            workers = self.config.concurrency,
            pool_id = %self.pool_id,
            "Worker pool started"
        );

        shutdown.await;
        tracing::info!(pool_id = %self.pool_id, "Shutdown requested, draining...");

        self.shutdown().await;

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Task panicked");
            }
        }

        tracing::info!(pool_id = %self.pool_id, "Worker pool stopped");
        Ok(())
    }

    /// Initiate graceful shutdown: stop claiming new jobs, then wait for
    /// in-flight attempts up to the configured deadline.
    pub async fn shutdown(&self) {
        self.draining.store(true, Ordering::SeqCst);

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;

        while self.in_progress.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    in_progress = self.in_progress.load(Ordering::SeqCst),
                    "Shutdown deadline reached, forcing stop"
                );
                break;
            }

            tokio::select! {
                _ = self.drain_notify.notified() => {}
                _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        // notify_one leaves a permit, so the reaper sees the stop even if
        // it has not reached its select yet.
        self.stop_notify.notify_one();
    }

    /// Number of attempts currently in flight.
    pub fn in_progress_count(&self) -> usize {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Whether the pool has stopped claiming new jobs.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

/// Generate a unique pool id from host, pid, and start time.
fn generate_pool_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let pid = std::process::id();
    let ts = crate::job::now_millis();
    format!("{}-{}-{}", host, pid, ts)
}
