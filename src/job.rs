//! Job definition and related types.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Highest admissible priority value. Priorities are clamped to
/// `0..=MAX_PRIORITY` at admission; 0 is processed first.
pub const MAX_PRIORITY: u8 = 10;

/// Unique identifier for a job. Assigned at enqueue time, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random JobId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle state of a job.
///
/// `Delayed` is a sub-case of waiting whose `not_before` lies in the
/// future; both are eligible for claiming once `not_before` passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is eligible for claiming.
    Waiting,
    /// Job is exclusively held by one worker.
    Active,
    /// Job is waiting with a future `not_before`.
    Delayed,
    /// Job delivered successfully. Terminal.
    Completed,
    /// Job exhausted its attempts. Terminal.
    Failed,
}

impl JobState {
    /// Whether the state permits no further transitions except eviction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Classification tag describing why an email is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailContext {
    MessageReceived,
    ProposalReceived,
    SiteRecruited,
    InvitationSent,
    FileUploaded,
    SignupConfirmation,
    StudyCreated,
    SiteCreated,
    ProposalStatusUpdated,
    StudyPublished,
}

impl std::fmt::Display for EmailContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmailContext::MessageReceived => "message_received",
            EmailContext::ProposalReceived => "proposal_received",
            EmailContext::SiteRecruited => "site_recruited",
            EmailContext::InvitationSent => "invitation_sent",
            EmailContext::FileUploaded => "file_uploaded",
            EmailContext::SignupConfirmation => "signup_confirmation",
            EmailContext::StudyCreated => "study_created",
            EmailContext::SiteCreated => "site_created",
            EmailContext::ProposalStatusUpdated => "proposal_status_updated",
            EmailContext::StudyPublished => "study_published",
        };
        f.write_str(s)
    }
}

/// The rendered email a job delivers, plus correlation fields for the
/// audit trail. Opaque to the queue and the workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    /// Destination address.
    pub to: String,
    /// Rendered subject line.
    pub subject: String,
    /// Rendered HTML body.
    pub html: String,
    /// Owning user.
    pub user_id: String,
    /// Owning organization, if any.
    pub organization_id: Option<String>,
    /// Correlated entity (thread, study, proposal...), if any.
    pub reference_id: Option<String>,
    /// Why this email is being sent.
    pub context: EmailContext,
}

/// A unit of queued delivery work with its own state and attempt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// The email to deliver.
    pub payload: EmailPayload,
    /// Priority in `0..=MAX_PRIORITY`; 0 drains first.
    pub priority: u8,
    /// Earliest timestamp (unix millis) the job may be claimed.
    pub not_before: i64,
    /// Maximum number of delivery attempts.
    pub max_attempts: u32,
    /// Attempts started so far; incremented on each claim.
    pub attempt_count: u32,
    /// Current lifecycle state.
    pub state: JobState,
    /// When the job was enqueued (unix millis).
    pub enqueued_at: i64,
    /// Store-assigned admission sequence; breaks priority ties FIFO.
    pub sequence: u64,
    /// When the current holder claimed the job, while `Active`.
    pub claimed_at: Option<i64>,
    /// Identity of the current holder, while `Active`.
    pub claimed_by: Option<String>,
    /// When the job reached a terminal state.
    pub finished_at: Option<i64>,
    /// Error message from the most recent failed attempt.
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new job ready for insertion.
    ///
    /// Priority is clamped to `0..=MAX_PRIORITY`. A non-zero delay puts
    /// the job in `Delayed` with `not_before = now + delay`. The store
    /// assigns `sequence` at insertion.
    pub fn new(
        payload: EmailPayload,
        priority: u8,
        delay: Duration,
        max_attempts: u32,
        now: i64,
    ) -> Self {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let state = if delay_ms > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };
        Self {
            id: JobId::new(),
            payload,
            priority: priority.min(MAX_PRIORITY),
            not_before: now.saturating_add(delay_ms),
            max_attempts: max_attempts.max(1),
            attempt_count: 0,
            state,
            enqueued_at: now,
            sequence: 0,
            claimed_at: None,
            claimed_by: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Whether another delivery attempt may be started after a failure.
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// Whether the job may be claimed at `now`.
    pub fn eligible(&self, now: i64) -> bool {
        matches!(self.state, JobState::Waiting | JobState::Delayed) && self.not_before <= now
    }

    /// Serialize the job to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a job from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Get the current unix timestamp in milliseconds.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> EmailPayload {
        EmailPayload {
            to: "site@example.com".to_string(),
            subject: "hello".to_string(),
            html: "<p>hello</p>".to_string(),
            user_id: "user-1".to_string(),
            organization_id: None,
            reference_id: None,
            context: EmailContext::MessageReceived,
        }
    }

    #[test]
    fn test_job_creation_defaults() {
        let job = Job::new(payload(), 0, Duration::ZERO, 3, 1_000);
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempt_count, 0);
        assert_eq!(job.not_before, 1_000);
        assert!(job.claimed_at.is_none());
        assert!(job.last_error.is_none());
    }

    #[test]
    fn test_job_with_delay_is_delayed() {
        let job = Job::new(payload(), 0, Duration::from_millis(60_000), 3, 1_000);
        assert_eq!(job.state, JobState::Delayed);
        assert_eq!(job.not_before, 61_000);
        assert!(!job.eligible(1_000));
        assert!(job.eligible(61_000));
    }

    #[test]
    fn test_huge_delay_saturates_instead_of_wrapping() {
        let job = Job::new(payload(), 0, Duration::from_millis(u64::MAX), 3, 1_000);
        assert_eq!(job.state, JobState::Delayed);
        assert_eq!(job.not_before, i64::MAX);
        assert!(!job.eligible(i64::MAX - 1));
    }

    #[test]
    fn test_priority_clamped_at_admission() {
        let job = Job::new(payload(), 42, Duration::ZERO, 3, 0);
        assert_eq!(job.priority, MAX_PRIORITY);
    }

    #[test]
    fn test_max_attempts_floor_of_one() {
        let job = Job::new(payload(), 0, Duration::ZERO, 0, 0);
        assert_eq!(job.max_attempts, 1);
    }

    #[test]
    fn test_can_retry() {
        let mut job = Job::new(payload(), 0, Duration::ZERO, 2, 0);
        assert!(job.can_retry());
        job.attempt_count = 1;
        assert!(job.can_retry());
        job.attempt_count = 2;
        assert!(!job.can_retry());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(!JobState::Delayed.is_terminal());
    }

    #[test]
    fn test_job_id_uniqueness() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_job_serialization_roundtrip() {
        let job = Job::new(payload(), 5, Duration::from_millis(250), 4, 7_000);
        let json = job.to_json().unwrap();
        let back = Job::from_json(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.priority, 5);
        assert_eq!(back.state, JobState::Delayed);
        assert_eq!(back.payload.to, "site@example.com");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&JobState::Waiting).unwrap();
        assert_eq!(json, "\"waiting\"");
        let json = serde_json::to_string(&JobState::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }

    #[test]
    fn test_context_display_matches_serde() {
        let json = serde_json::to_string(&EmailContext::SignupConfirmation).unwrap();
        assert_eq!(json, format!("\"{}\"", EmailContext::SignupConfirmation));
    }
}
