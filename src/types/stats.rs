//! Network chord statistics types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::number;

/// Directed, sanitized `"<from>;<to>"` action pair.
///
/// `.` is replaced by `#` in both halves so the key is a valid document
/// field name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChordKey(String);

impl ChordKey {
    /// Build a chord key for the edge `from → to`.
    pub fn new(from: &str, to: &str) -> Self {
        Self(format!("{};{}", from, to).replace('.', "#"))
    }

    /// Borrow the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chord key → edge frequency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChordMap(#[serde(deserialize_with = "number::counts")] BTreeMap<ChordKey, u64>);

impl ChordMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `from → to`.
    pub fn increment(&mut self, from: &str, to: &str) {
        *self.0.entry(ChordKey::new(from, to)).or_insert(0) += 1;
    }

    /// Add every count of `other` into this map.
    pub fn merge(&mut self, other: &ChordMap) {
        for (key, count) in &other.0 {
            *self.0.entry(key.clone()).or_insert(0) += count;
        }
    }

    /// Count for a raw chord key.
    pub fn get(&self, key: &str) -> u64 {
        self.0.get(&ChordKey(key.to_string())).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Number of distinct chords.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no chords are recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate chords in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChordKey, u64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

/// One owner's chord counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStat {
    /// Account id, or the system owner for the global rollup.
    pub owner_id: String,
    /// Calendar day (UTC).
    pub day: NaiveDate,
    /// Chord counts.
    #[serde(default)]
    pub data: ChordMap,
    /// Last write (epoch seconds).
    #[serde(default, deserialize_with = "number::int")]
    pub updated_at: i64,
}
