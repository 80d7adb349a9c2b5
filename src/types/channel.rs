//! Channel types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a channel owned by an account.
///
/// Stored ids are UUID strings, but hubs may carry arbitrary (possibly
/// stale) ids, so the raw string is kept as is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A configured connector endpoint bound to one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel id.
    pub id: ChannelId,
    /// Owning account.
    pub owner_id: String,
    /// Portable action identifier, e.g. `"twitter.post"`.
    pub action: String,
}

impl Channel {
    /// Create a new channel.
    pub fn new(id: impl Into<ChannelId>, owner_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            action: action.into(),
        }
    }
}
