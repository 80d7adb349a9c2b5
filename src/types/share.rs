//! Portable pipeline snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use xxhash_rust::xxh64::xxh64;

use super::hub::TransformMap;
use super::number;
use super::pipeline::BipType;
use crate::SOURCE_KEY;

/// Replace every `.` with `-` so keys are valid document field names.
pub fn normalize_key(key: &str) -> String {
    key.replace('.', "-")
}

/// Deduplicated set of portable action identifiers a share depends on.
///
/// Never contains the source marker. Serializes as a sorted list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeSet<String>);

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an action. The source marker is ignored.
    pub fn insert(&mut self, action: impl Into<String>) -> bool {
        let action = action.into();
        if action == SOURCE_KEY {
            return false;
        }
        self.0.insert(action)
    }

    /// Whether `action` is recorded.
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action)
    }

    /// Actions in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no actions are recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable hash of the sorted, comma-joined manifest: xxh64 (seed 0) as
    /// 16 hex digits.
    pub fn hash(&self) -> String {
        let joined = self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        format!("{:016x}", xxh64(joined.as_bytes(), 0))
    }
}

impl<S: Into<String>> FromIterator<S> for Manifest {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for action in iter {
            manifest.insert(action);
        }
        manifest
    }
}

/// One hub entry of a shared pipeline, expressed in actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedHubNode {
    /// Target actions.
    #[serde(default)]
    pub edges: Vec<String>,
    /// Normalized target action → import key → template.
    #[serde(default)]
    pub transforms: BTreeMap<String, TransformMap>,
}

/// Normalized source action → entry.
pub type SharedHub = BTreeMap<String, SharedHubNode>;

/// Portable, anonymized snapshot of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineShare {
    /// Store-assigned id, absent until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Shared pipeline.
    pub bip_id: String,
    /// Sharing account.
    pub owner_id: String,
    /// Display name of the sharing account.
    #[serde(default)]
    pub owner_name: String,
    /// Pipeline kind.
    #[serde(rename = "type")]
    pub bip_type: BipType,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description; searchable through share listings.
    #[serde(default)]
    pub note: String,
    /// Icon URI.
    #[serde(default)]
    pub icon: String,
    /// Exported config, credentials stripped.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Hub with channel ids replaced by actions.
    #[serde(default)]
    pub hub: SharedHub,
    /// Actions the share depends on.
    #[serde(default)]
    pub manifest: Manifest,
    /// Hash of the manifest.
    #[serde(default)]
    pub manifest_hash: String,
    /// Creation time (epoch seconds).
    #[serde(default, deserialize_with = "number::int")]
    pub created: i64,
    /// Last update time (epoch seconds).
    #[serde(default, deserialize_with = "number::int")]
    pub updated: i64,
}
