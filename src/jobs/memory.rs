//! In-memory job sink and activity log for testing.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeSet;

use super::{ActivityEvent, ActivityLog, Job, JobKind, JobSink, JobSinkError};

/// Job sink that records every accepted job.
///
/// Jobs whose payload `id` was passed to [`InMemoryJobSink::reject_id`] are
/// refused; a closed sink refuses everything.
#[derive(Debug, Default)]
pub struct InMemoryJobSink {
    jobs: Mutex<Vec<Job>>,
    rejected_ids: RwLock<BTreeSet<String>>,
    closed: RwLock<bool>,
}

impl InMemoryJobSink {
    /// Create an open, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse jobs whose payload carries this `id`.
    pub fn reject_id(&self, id: impl Into<String>) {
        self.rejected_ids.write().insert(id.into());
    }

    /// Refuse every further job.
    pub fn close(&self) {
        *self.closed.write() = true;
    }

    /// Every accepted job, in submission order.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().clone()
    }

    /// Accepted jobs of one kind.
    pub fn jobs_of(&self, kind: JobKind) -> Vec<Job> {
        self.jobs.lock().iter().filter(|j| j.kind == kind).cloned().collect()
    }
}

#[async_trait]
impl JobSink for InMemoryJobSink {
    async fn submit(&self, job: Job) -> Result<(), JobSinkError> {
        if *self.closed.read() {
            return Err(JobSinkError::Unavailable("sink closed".to_string()));
        }

        let id = job.payload.get("id").and_then(Value::as_str);
        if let Some(id) = id.filter(|id| self.rejected_ids.read().contains(*id)) {
            return Err(JobSinkError::Rejected {
                kind: job.kind,
                reason: format!("payload {} refused", id),
            });
        }

        self.jobs.lock().push(job);
        Ok(())
    }
}

/// Activity log that records events.
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    events: Mutex<Vec<ActivityEvent>>,
}

impl InMemoryActivityLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded event, in order.
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, event: ActivityEvent) -> Result<(), JobSinkError> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_rejects_marked_ids() {
        let sink = InMemoryJobSink::new();
        sink.reject_id("b2");

        assert!(sink.submit(Job::new(JobKind::BipTrigger, json!({ "id": "b1" }))).await.is_ok());
        let err = sink
            .submit(Job::new(JobKind::BipTrigger, json!({ "id": "b2" })))
            .await
            .unwrap_err();
        assert!(matches!(err, JobSinkError::Rejected { kind: JobKind::BipTrigger, .. }));
        assert_eq!(sink.jobs_of(JobKind::BipTrigger).len(), 1);
    }
}
