//! Trigger dispatch.
//!
//! Selects runnable trigger pipelines and submits one `bip_trigger` job per
//! pipeline. Completion is the join of every submission.

use futures_util::future::join_all;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::KernelError;
use crate::jobs::{Job, JobKind, JobSink};
use crate::resolver::ChannelDirectory;
use crate::store::{Collection, DocumentStore, Filter};

/// Outcome of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSummary {
    /// Nothing matched.
    NoPipelines,
    /// Jobs were submitted for every matching pipeline.
    Dispatched {
        /// Jobs the sink accepted.
        submitted: usize,
        /// Jobs the sink refused.
        failed: usize,
    },
}

impl DispatchSummary {
    /// Jobs the sink accepted.
    pub fn submitted(&self) -> usize {
        match self {
            Self::NoPipelines => 0,
            Self::Dispatched { submitted, .. } => *submitted,
        }
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPipelines => write!(f, "No Bips"),
            Self::Dispatched { submitted, failed: 0 } => write!(f, "{} Triggers Fired", submitted),
            Self::Dispatched { submitted, failed } => {
                write!(f, "{} Triggers Fired, {} failed", submitted, failed)
            }
        }
    }
}

/// Fires trigger pipelines onto the job queue.
pub struct TriggerDispatcher<S: DocumentStore, D: ChannelDirectory> {
    store: Arc<S>,
    directory: Arc<D>,
    sink: Arc<dyn JobSink>,
}

impl<S, D> TriggerDispatcher<S, D>
where
    S: DocumentStore + 'static,
    D: ChannelDirectory + 'static,
{
    /// Create a dispatcher.
    pub fn new(store: Arc<S>, directory: Arc<D>, sink: Arc<dyn JobSink>) -> Self {
        Self { store, directory, sink }
    }

    /// Trigger every unpaused trigger pipeline matching `extra`.
    ///
    /// Each job carries the stored pipeline document plus `socketTrigger`.
    /// A refused submission is logged and counted; it does not stop the
    /// others.
    pub async fn trigger_all(&self, extra: Option<Filter>, socket_origin: bool) -> Result<DispatchSummary, KernelError> {
        let mut filter = Filter::eq("type", "trigger").and(Filter::eq("paused", false));
        if let Some(extra) = extra {
            filter = filter.and(extra);
        }

        let docs = self
            .store
            .find_filter(Collection::Bip, &filter)
            .await
            .map_err(KernelError::from_store)?;

        if docs.is_empty() {
            tracing::info!(socket_origin, "No trigger pipelines to fire");
            return Ok(DispatchSummary::NoPipelines);
        }

        let matched = docs.len();
        let outcomes = join_all(docs.into_iter().map(|doc| self.submit(doc, socket_origin))).await;
        let submitted = outcomes.iter().filter(|accepted| **accepted).count();
        let failed = matched - submitted;

        tracing::info!(matched, submitted, failed, socket_origin, "Triggers fired");
        Ok(DispatchSummary::Dispatched { submitted, failed })
    }

    /// Trigger the pipelines whose source channel is bound to `action`.
    pub async fn trigger_by_channel_action(&self, action: &str) -> Result<DispatchSummary, KernelError> {
        let channels = self.directory.find_by_action(action).await?;
        if channels.is_empty() {
            tracing::debug!(action, "No channels bound to action");
            return Ok(DispatchSummary::NoPipelines);
        }

        let ids = channels.into_iter().map(|c| c.id.as_str().to_string());
        self.trigger_all(Some(Filter::is_in("config.channel_id", ids)), true)
            .await
    }

    async fn submit(&self, mut doc: Value, socket_origin: bool) -> bool {
        let bip_id = doc.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        if let Some(fields) = doc.as_object_mut() {
            fields.insert("socketTrigger".to_string(), Value::Bool(socket_origin));
        }

        match self.sink.submit(Job::new(JobKind::BipTrigger, doc)).await {
            Ok(()) => {
                tracing::debug!(bip_id = %bip_id, "Trigger submitted");
                true
            }
            Err(e) => {
                tracing::warn!(bip_id = %bip_id, error = %e, "Trigger submission failed");
                false
            }
        }
    }
}
