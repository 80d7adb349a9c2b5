//! Job sink and activity log collaborators.
//!
//! Both are fire-and-forget from the kernel's point of view: a submission
//! that returns `Ok` is considered delivered.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

pub use memory::{InMemoryActivityLog, InMemoryJobSink};

/// Kind of job submitted to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Run one pipeline.
    BipTrigger,
    /// Record a pipeline activity entry.
    BipActivity,
    /// Bump a per-account usage counter.
    UserStat,
}

impl JobKind {
    /// Queue name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BipTrigger => "bip_trigger",
            Self::BipActivity => "bip_activity",
            Self::UserStat => "user_stat",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Queue the job goes to.
    pub kind: JobKind,
    /// Job body.
    pub payload: Value,
}

impl Job {
    /// Create a job.
    pub fn new(kind: JobKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// Error type for job submission.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobSinkError {
    /// The sink refused this job.
    #[error("{kind} job rejected: {reason}")]
    Rejected {
        /// Kind of the rejected job.
        kind: JobKind,
        /// Reason given by the sink.
        reason: String,
    },
    /// The sink is not reachable.
    #[error("Job sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for execution and bookkeeping jobs.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Submit one job.
    async fn submit(&self, job: Job) -> Result<(), JobSinkError>;
}

/// Side-effect events emitted by share operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ActivityEvent {
    /// A pipeline was shared for the first time.
    BipShare {
        /// Sharing account.
        owner_id: String,
        /// Shared pipeline.
        bip_id: String,
    },
    /// A share was removed.
    BipUnshare {
        /// Sharing account.
        owner_id: String,
        /// Previously shared pipeline.
        bip_id: String,
    },
    /// A usage counter should be incremented.
    UsageCounter {
        /// Account whose counter moves.
        owner_id: String,
        /// Counter name, e.g. `share_total`.
        counter: String,
    },
}

impl ActivityEvent {
    /// The job this event becomes on a job queue.
    pub fn to_job(&self) -> Job {
        match self {
            Self::BipShare { owner_id, bip_id } => Job::new(
                JobKind::BipActivity,
                json!({ "owner_id": owner_id, "bip_id": bip_id, "code": "bip_share" }),
            ),
            Self::BipUnshare { owner_id, bip_id } => Job::new(
                JobKind::BipActivity,
                json!({ "owner_id": owner_id, "bip_id": bip_id, "code": "bip_unshare" }),
            ),
            Self::UsageCounter { owner_id, counter } => Job::new(
                JobKind::UserStat,
                json!({ "owner_id": owner_id, "type": counter }),
            ),
        }
    }
}

/// Best-effort activity and usage log.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Record one event.
    async fn record(&self, event: ActivityEvent) -> Result<(), JobSinkError>;
}

/// Activity log that forwards events to a job sink.
pub struct JobActivityLog {
    sink: Arc<dyn JobSink>,
}

impl JobActivityLog {
    /// Wrap a job sink.
    pub fn new(sink: Arc<dyn JobSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ActivityLog for JobActivityLog {
    async fn record(&self, event: ActivityEvent) -> Result<(), JobSinkError> {
        self.sink.submit(event.to_job()).await
    }
}

/// Record an event, logging instead of propagating failures.
pub async fn record_best_effort(log: &dyn ActivityLog, event: ActivityEvent) {
    if let Err(e) = log.record(event.clone()).await {
        tracing::warn!(error = %e, event = ?event, "Activity log write failed");
    }
}
