//! # bip-hub-kernel
//!
//! Graph logic for channel pipelines ("bips").
//!
//! A pipeline's hub is a directed graph whose nodes are channel ids. The
//! kernel walks that graph to:
//!
//! 1. Export a pipeline as a portable share, with channel ids replaced by
//!    channel actions and a manifest of the actions it needs
//! 2. Fire trigger pipelines onto a job queue
//! 3. Count `from action → to action` chords per account and hub-wide
//! 4. Pause or delete pipelines past their time or impression budget
//!
//! ## Architecture
//!
//! ```text
//! DocumentStore ─┬─ ChannelDirectory → ChannelResolver ─┬─ ShareTranscoder
//!                │                                      └─ NetworkStatsAggregator
//!                ├─ TriggerDispatcher → JobSink
//!                ├─ ExpirySweeper
//!                └─ TransformHints
//! ```
//!
//! ## Guarantees
//!
//! - A channel reference that does not resolve is dropped from derived
//!   graphs, never reported as an error
//! - Every store query of an owner-scoped operation carries that owner's id
//! - Batch operations (hub stats, expiry) isolate per-account failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod expiry;
pub mod hints;
pub mod jobs;
pub mod resolver;
pub mod share;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod types;

// Re-exports
pub use config::{KernelConfig, LogConfig, LogFormat};
pub use dispatch::{DispatchSummary, TriggerDispatcher};
pub use error::{KernelError, Reply};
pub use expiry::{expiry_filter, owner_timezone, ExpiryAction, ExpirySummary, ExpirySweeper, OwnerExpiry};
pub use hints::{TransformDefault, TransformHints};
pub use jobs::{
    ActivityEvent, ActivityLog, InMemoryActivityLog, InMemoryJobSink, Job, JobActivityLog, JobKind, JobSink,
    JobSinkError,
};
pub use resolver::{ChannelDirectory, ChannelResolver, Resolution, StoreChannelDirectory};
pub use share::{
    instantiate, transcode, Instantiation, ShareOrder, SharePage, ShareQuery, ShareTranscoder, SHARE_ENTITY,
};
pub use stats::{chord_map_for, AccountFailure, HubStatsSummary, NetworkStatsAggregator};
pub use store::{Collection, DocumentStore, Filter, InMemoryDocumentStore, Page, PageRequest, Sort};
pub use telemetry::init_tracing;
pub use template::{Template, Token};
pub use types::{
    normalize_key, Account, AccountContext, AccountOption, BipType, Channel, ChannelId, ChordKey, ChordMap, EndLife,
    ExpiryMode, Hub, HubNode, Manifest, NetworkStat, Pipeline, PipelineShare, SharedHub, SharedHubNode, SourceKey,
    TransformMap,
};

/// Hub key of a pipeline's own input.
pub const SOURCE_KEY: &str = "source";

/// Default owner id of system-wide stats rows and transform hints.
pub const SYSTEM_OWNER_ID: &str = "system";
