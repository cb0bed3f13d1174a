//! Client for admitting jobs into the queue.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::{Backend, SharedBackend};
use crate::config::QueueConfig;
use crate::error::{Result, SpoolError};
use crate::job::{now_millis, EmailContext, EmailPayload, Job, JobId};
use crate::status::QueueCounts;
use crate::template::EmailTemplate;

/// Longest admissible subject line.
const MAX_SUBJECT_LEN: usize = 200;

/// An enqueue request carrying already-rendered subject and body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub to: String,
    pub user_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub context: EmailContext,
    pub subject: String,
    pub html: String,
    /// Priority 0..=10, 0 highest. Defaults to 0; out-of-range values
    /// are clamped at admission.
    #[serde(default)]
    pub priority: Option<u8>,
    /// Delivery delay in milliseconds. Defaults to 0.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    /// Attempt budget 1..=10. Defaults to the configured value (3).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// An enqueue request carrying a template instead of rendered text.
///
/// The template is rendered here, before a job exists; the queue and the
/// workers never render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub to: String,
    pub user_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub template: EmailTemplate,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Client for enqueueing email jobs and reading queue status.
///
/// Defaults are uniform across both submission paths: priority 0,
/// no delay, and the configured attempt budget. No path gets a
/// special-cased priority.
#[derive(Clone)]
pub struct Client {
    backend: SharedBackend,
    default_max_attempts: u32,
}

impl Client {
    /// Create a client over the given store.
    pub fn new(backend: SharedBackend, config: &QueueConfig) -> Self {
        Self {
            backend,
            default_max_attempts: config.default_max_attempts,
        }
    }

    /// Validate and enqueue a rendered email. Returns the job id; the
    /// caller observes the outcome via the status counts or the audit
    /// trail, never via a callback.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<JobId> {
        validate_address(&request.to)?;
        validate_content(&request.subject, &request.html)?;
        let max_attempts = self.resolve_attempts(request.max_attempts)?;

        let payload = EmailPayload {
            to: request.to,
            subject: request.subject,
            html: request.html,
            user_id: request.user_id,
            organization_id: request.organization_id,
            reference_id: request.reference_id,
            context: request.context,
        };
        let job = Job::new(
            payload,
            request.priority.unwrap_or(0),
            Duration::from_millis(request.delay_ms.unwrap_or(0)),
            max_attempts,
            now_millis(),
        );
        let id = job.id.clone();

        self.backend.insert(job).await?;
        tracing::debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    /// Render a template and enqueue the result.
    pub async fn enqueue_template(&self, request: TemplateRequest) -> Result<JobId> {
        let rendered = request.template.render();
        self.enqueue(EnqueueRequest {
            to: request.to,
            user_id: request.user_id,
            organization_id: request.organization_id,
            reference_id: request.reference_id,
            context: request.template.context(),
            subject: rendered.subject,
            html: rendered.html,
            priority: request.priority,
            delay_ms: request.delay_ms,
            max_attempts: request.max_attempts,
        })
        .await
    }

    /// Snapshot the current queue counts.
    pub async fn counts(&self) -> Result<QueueCounts> {
        self.backend.counts().await
    }

    /// Look up a job by id.
    pub async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        self.backend.get(id).await
    }

    fn resolve_attempts(&self, requested: Option<u32>) -> Result<u32> {
        match requested {
            None => Ok(self.default_max_attempts),
            Some(n) if (1..=10).contains(&n) => Ok(n),
            Some(n) => Err(SpoolError::Validation(format!(
                "max_attempts must be between 1 and 10, got {n}"
            ))),
        }
    }
}

fn validate_address(to: &str) -> Result<()> {
    let valid = to
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if valid {
        Ok(())
    } else {
        Err(SpoolError::Validation(format!(
            "invalid destination address: {to:?}"
        )))
    }
}

fn validate_content(subject: &str, html: &str) -> Result<()> {
    if subject.is_empty() {
        return Err(SpoolError::Validation("subject must not be empty".to_string()));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(SpoolError::Validation(format!(
            "subject must be at most {MAX_SUBJECT_LEN} characters"
        )));
    }
    if html.is_empty() {
        return Err(SpoolError::Validation("html body must not be empty".to_string()));
    }
    Ok(())
}
