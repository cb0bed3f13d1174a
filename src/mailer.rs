//! External collaborator contracts: the delivery transport and the
//! audit logger.
//!
//! The queue calls the mailer at least once per logical job; duplicate
//! deliveries across retries are possible and accepted. The audit log is
//! best-effort telemetry: its failures never alter a job's queue state.

use async_trait::async_trait;

use crate::job::{EmailPayload, Job};

/// Error reported by a delivery transport.
#[derive(Debug)]
pub struct MailerError {
    message: String,
}

impl MailerError {
    /// Create a new delivery error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error reason.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for MailerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MailerError {}

/// Outbound delivery transport.
///
/// Implementations must tolerate being called more than once for the
/// same logical job (at-least-once, not exactly-once).
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one email. Normal return means the message was accepted
    /// by the outbound transport.
    async fn send(&self, payload: &EmailPayload) -> Result<(), MailerError>;
}

/// Outcome of one processing cycle, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The message was accepted by the transport.
    Sent,
    /// The attempt failed and the job was rescheduled with backoff.
    Retried,
    /// The attempt failed and the job's attempts are exhausted.
    Failed,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryOutcome::Sent => "sent",
            DeliveryOutcome::Retried => "retried",
            DeliveryOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Best-effort audit sink for delivery outcomes.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Persist one audit record. Errors are caught by the caller and
    /// never reach the job pipeline.
    async fn record(
        &self,
        job: &Job,
        outcome: DeliveryOutcome,
        error: Option<&str>,
    ) -> Result<(), MailerError>;
}

/// Delivery log that emits structured log events instead of persisting.
pub struct TracingLog;

#[async_trait]
impl DeliveryLog for TracingLog {
    async fn record(
        &self,
        job: &Job,
        outcome: DeliveryOutcome,
        error: Option<&str>,
    ) -> Result<(), MailerError> {
        tracing::info!(
            job_id = %job.id,
            to = %job.payload.to,
            context = %job.payload.context,
            outcome = %outcome,
            error = error.unwrap_or(""),
            "Delivery outcome"
        );
        Ok(())
    }
}

/// Mailer that logs the email instead of sending it. Useful for local
/// development and tests.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, payload: &EmailPayload) -> Result<(), MailerError> {
        tracing::info!(
            to = %payload.to,
            subject = %payload.subject,
            context = %payload.context,
            "Would send email"
        );
        Ok(())
    }
}
