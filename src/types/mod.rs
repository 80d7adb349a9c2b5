//! Core types for the hub kernel.

pub mod account;
pub mod channel;
pub mod hub;
mod number;
pub mod pipeline;
pub mod share;
pub mod stats;

pub use account::{Account, AccountContext, AccountOption, ExpiryMode};
pub use channel::{Channel, ChannelId};
pub use hub::{Hub, HubNode, SourceKey, TransformMap};
pub use pipeline::{BipType, EndLife, Pipeline};
pub use share::{normalize_key, Manifest, PipelineShare, SharedHub, SharedHubNode};
pub use stats::{ChordKey, ChordMap, NetworkStat};
