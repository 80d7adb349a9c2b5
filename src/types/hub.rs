//! Hub graph model.
//!
//! A hub maps a source key (the pipeline's own `"source"` input or a channel
//! id) to the channels it feeds and the per-target transform templates.
//!
//! ```text
//! "source" ──► c1 ──► c2
//!    │          └───► c3
//!    └────────► c4
//! ```
//!
//! Graph walks never fail on dangling references: an id that does not
//! resolve to one of the owner's channels is skipped by the caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::channel::ChannelId;
use crate::SOURCE_KEY;

/// Import key → template string for one transform target.
pub type TransformMap = BTreeMap<String, String>;

/// Key of a hub entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKey {
    /// The pipeline's own trigger input.
    Source,
    /// A channel owned by the pipeline's account.
    Channel(ChannelId),
}

impl SourceKey {
    /// The channel id, unless this is the source marker.
    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Self::Source => None,
            Self::Channel(id) => Some(id),
        }
    }

    /// Whether this is the source marker.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source)
    }

    /// Raw key string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Source => SOURCE_KEY,
            Self::Channel(id) => id.as_str(),
        }
    }
}

impl From<String> for SourceKey {
    fn from(s: String) -> Self {
        if s == SOURCE_KEY {
            Self::Source
        } else {
            Self::Channel(ChannelId::new(s))
        }
    }
}

impl From<&str> for SourceKey {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ChannelId> for SourceKey {
    fn from(id: ChannelId) -> Self {
        Self::Channel(id)
    }
}

impl From<SourceKey> for String {
    fn from(key: SourceKey) -> Self {
        match key {
            SourceKey::Source => SOURCE_KEY.to_string(),
            SourceKey::Channel(id) => id.as_str().to_string(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hub entry: outgoing edges and transforms keyed by target channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubNode {
    /// Target channels fed by this source.
    #[serde(default)]
    pub edges: Vec<ChannelId>,
    /// Target channel → import key → template.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transforms: BTreeMap<ChannelId, TransformMap>,
}

impl HubNode {
    /// Create a node with edges and no transforms.
    pub fn with_edges<I, C>(edges: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ChannelId>,
    {
        Self {
            edges: edges.into_iter().map(Into::into).collect(),
            transforms: BTreeMap::new(),
        }
    }

    /// Add a transform template for `target`.
    pub fn with_transform(
        mut self,
        target: impl Into<ChannelId>,
        import: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.transforms
            .entry(target.into())
            .or_default()
            .insert(import.into(), template.into());
        self
    }
}

/// The adjacency structure of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hub(BTreeMap<SourceKey, HubNode>);

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<SourceKey>, node: HubNode) -> Self {
        self.0.insert(key.into(), node);
        self
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<SourceKey>, node: HubNode) {
        self.0.insert(key.into(), node);
    }

    /// Look up an entry.
    pub fn get(&self, key: &SourceKey) -> Option<&HubNode> {
        self.0.get(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceKey, &HubNode)> {
        self.0.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the hub has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every channel id referenced as an edge target or a transform target.
    pub fn referenced_channels(&self) -> BTreeSet<ChannelId> {
        let mut ids = BTreeSet::new();
        for node in self.0.values() {
            ids.extend(node.edges.iter().cloned());
            ids.extend(node.transforms.keys().cloned());
        }
        ids
    }

    /// Lazily yield `(source key, edge target)` pairs.
    pub fn edge_pairs(&self) -> impl Iterator<Item = (&SourceKey, &ChannelId)> + '_ {
        self.0
            .iter()
            .flat_map(|(key, node)| node.edges.iter().map(move |edge| (key, edge)))
    }

    /// Referenced ids (source keys included) for which `is_known` is false.
    pub fn dangling<F>(&self, is_known: F) -> BTreeSet<ChannelId>
    where
        F: Fn(&ChannelId) -> bool,
    {
        let source_keys = self.0.keys().filter_map(SourceKey::channel_id).cloned();
        self.referenced_channels()
            .into_iter()
            .chain(source_keys)
            .filter(|id| !is_known(id))
            .collect()
    }
}
