#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use mailspool::{
    DeliveryLog, DeliveryOutcome, EmailContext, EmailPayload, EnqueueRequest, Job, JobId, Mailer,
    MailerError,
};

static TRACING: Once = Once::new();

/// Install a `RUST_LOG`-driven subscriber once per test binary, so queue
/// internals are visible when debugging a failing test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Mailer that records each accepted destination.
#[derive(Default)]
pub struct CountingMailer {
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for CountingMailer {
    async fn send(&self, payload: &EmailPayload) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(payload.to.clone());
        Ok(())
    }
}

impl CountingMailer {
    pub fn sent_to(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

/// Mailer that always fails.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _payload: &EmailPayload) -> Result<(), MailerError> {
        Err(MailerError::new("relay refused"))
    }
}

/// Mailer that fails the first `n` calls, then succeeds.
pub struct FlakyMailer {
    remaining_failures: AtomicU32,
}

impl FlakyMailer {
    pub fn failing(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Mailer for FlakyMailer {
    async fn send(&self, _payload: &EmailPayload) -> Result<(), MailerError> {
        let took_failure = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took_failure {
            return Err(MailerError::new("temporarily unavailable"));
        }
        Ok(())
    }
}

/// Mailer that takes a while before accepting.
pub struct SlowMailer {
    pub delay: Duration,
}

#[async_trait]
impl Mailer for SlowMailer {
    async fn send(&self, _payload: &EmailPayload) -> Result<(), MailerError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Audit log capturing every record.
#[derive(Default)]
pub struct RecordingLog {
    pub records: Mutex<Vec<(JobId, DeliveryOutcome, Option<String>)>>,
}

#[async_trait]
impl DeliveryLog for RecordingLog {
    async fn record(
        &self,
        job: &Job,
        outcome: DeliveryOutcome,
        error: Option<&str>,
    ) -> Result<(), MailerError> {
        self.records
            .lock()
            .unwrap()
            .push((job.id.clone(), outcome, error.map(String::from)));
        Ok(())
    }
}

impl RecordingLog {
    pub fn outcomes_for(&self, id: &JobId) -> Vec<DeliveryOutcome> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(job_id, _, _)| job_id == id)
            .map(|(_, outcome, _)| *outcome)
            .collect()
    }
}

/// Audit log that always fails; outcomes must still apply.
pub struct FailingLog;

#[async_trait]
impl DeliveryLog for FailingLog {
    async fn record(
        &self,
        _job: &Job,
        _outcome: DeliveryOutcome,
        _error: Option<&str>,
    ) -> Result<(), MailerError> {
        Err(MailerError::new("audit store down"))
    }
}

/// A valid enqueue request addressed to `to`.
pub fn request(to: &str) -> EnqueueRequest {
    EnqueueRequest {
        to: to.to_string(),
        user_id: "user-1".to_string(),
        organization_id: None,
        reference_id: None,
        context: EmailContext::InvitationSent,
        subject: "You are invited".to_string(),
        html: "<p>Join the study</p>".to_string(),
        priority: None,
        delay_ms: None,
        max_attempts: None,
    }
}

/// Poll `probe` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
