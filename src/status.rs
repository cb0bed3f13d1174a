//! Aggregate queue status reporting.

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, SharedBackend};
use crate::error::Result;

/// Point-in-time snapshot of job counts per state.
///
/// Eventually consistent with concurrent mutation; the sum always equals
/// the number of non-evicted jobs at the instant of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Jobs eligible for claiming now.
    pub waiting: usize,
    /// Jobs exclusively held by a worker.
    pub active: usize,
    /// Jobs delivered successfully and still retained.
    pub completed: usize,
    /// Jobs that exhausted their attempts and are still retained.
    pub failed: usize,
    /// Jobs whose `not_before` is still in the future.
    pub delayed: usize,
}

impl QueueCounts {
    /// Total number of non-evicted jobs in the snapshot.
    pub fn total(&self) -> usize {
        self.waiting + self.active + self.completed + self.failed + self.delayed
    }
}

/// Read-only view over the queue's state counts.
///
/// Adds no state of its own; the read path shares nothing with job
/// processing beyond the store's own brief synchronization.
#[derive(Clone)]
pub struct StatusAggregator {
    backend: SharedBackend,
}

impl StatusAggregator {
    /// Create an aggregator over the given store.
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Snapshot the current counts.
    pub async fn counts(&self) -> Result<QueueCounts> {
        self.backend.counts().await
    }
}
