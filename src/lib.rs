//! # mailspool - asynchronous email delivery queue
//!
//! Decouples producing an email from its delivery: callers enqueue a
//! job and return immediately, while a pool of concurrent workers
//! claims and delivers jobs with durable exponential-backoff retry.
//!
//! Main pieces:
//! - `Backend` trait for storage implementations (with an in-process
//!   [`MemoryBackend`])
//! - [`Client`] for validated admission, plain or template-based
//! - [`WorkerPool`] driving claim-and-process slots plus the stale-claim
//!   [`Reaper`]
//! - [`Mailer`] / [`DeliveryLog`] contracts for the delivery transport
//!   and the audit trail
//! - [`StatusAggregator`] for `{waiting, active, completed, failed,
//!   delayed}` counts

mod backend;
mod backoff;
mod client;
mod config;
mod error;
mod job;
mod mailer;
mod memory;
mod pool;
mod reaper;
mod status;
mod template;
mod worker;

// Re-export main types
pub use backend::{Backend, DynBackend, SharedBackend};
pub use backoff::{BackoffPolicy, DEFAULT_BACKOFF_BASE};
pub use client::{Client, EnqueueRequest, TemplateRequest};
pub use config::{QueueConfig, QueueConfigBuilder};
pub use error::{Result, SpoolError};
pub use job::{EmailContext, EmailPayload, Job, JobId, JobState, MAX_PRIORITY};
pub use mailer::{DeliveryLog, DeliveryOutcome, LogMailer, Mailer, MailerError, TracingLog};
pub use memory::MemoryBackend;
pub use pool::{WorkerPool, WorkerPoolBuilder};
pub use reaper::Reaper;
pub use status::{QueueCounts, StatusAggregator};
pub use template::{EmailTemplate, RenderedEmail};
