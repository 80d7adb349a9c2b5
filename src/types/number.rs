//! Lenient numeric decoding.
//!
//! Document stores backed by JavaScript keep every number as a double, so
//! integral fields may arrive as `3.0`. These helpers accept either form.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn to_i64(&self) -> i64 {
        match *self {
            Self::Int(n) => n,
            // Saturates at the i64 bounds.
            Self::Float(f) => f as i64,
        }
    }
}

/// An `i64` written as an integer, a float or `null` (read as 0).
pub(crate) fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<Number>::deserialize(deserializer)?.map_or(0, |n| n.to_i64()))
}

/// A map of non-negative counts written as integers or floats.
pub(crate) fn counts<'de, D, K>(deserializer: D) -> Result<BTreeMap<K, u64>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
{
    let raw = BTreeMap::<K, Number>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, n)| (key, u64::try_from(n.to_i64()).unwrap_or(0)))
        .collect())
}
