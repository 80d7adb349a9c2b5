//! Pipeline ("bip") types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::channel::ChannelId;
use super::hub::Hub;
use super::number;

/// Kind of pipeline.
///
/// Unknown kinds are preserved verbatim so documents survive round trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BipType {
    /// Periodically triggered from a source channel.
    Trigger,
    /// Exposed as an HTTP endpoint.
    Http,
    /// Exposed as an email address.
    Smtp,
    /// Any other kind.
    Other(String),
}

impl BipType {
    /// Raw type string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Trigger => "trigger",
            Self::Http => "http",
            Self::Smtp => "smtp",
            Self::Other(s) => s,
        }
    }

    /// Pseudo action used as a graph node for the pipeline's own input.
    pub fn pseudo_action(&self) -> String {
        format!("bip.{}", self.as_str())
    }
}

impl From<String> for BipType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "trigger" => Self::Trigger,
            "http" => Self::Http,
            "smtp" => Self::Smtp,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for BipType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<BipType> for String {
    fn from(t: BipType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for BipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime and usage budget. Zero means "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndLife {
    /// Expiry time as epoch seconds.
    #[serde(default, deserialize_with = "number::int")]
    pub time: i64,
    /// Impression budget.
    #[serde(default, deserialize_with = "number::int")]
    pub imp: i64,
}

/// A user-defined automation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline id.
    pub id: String,
    /// Owning account.
    pub owner_id: String,
    /// Pipeline kind.
    #[serde(rename = "type")]
    pub bip_type: BipType,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub note: String,
    /// Icon URI.
    #[serde(default)]
    pub icon: String,
    /// Paused pipelines are never triggered.
    #[serde(default)]
    pub paused: bool,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Lifetime and usage budget.
    #[serde(default)]
    pub end_life: EndLife,
    /// Adjacency structure.
    #[serde(default)]
    pub hub: Hub,
    /// Impressions consumed so far.
    #[serde(rename = "_imp_actual", default, deserialize_with = "number::int")]
    pub imp_actual: i64,
}

impl Pipeline {
    /// Create an unpaused pipeline with an empty hub and config.
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, bip_type: BipType) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            bip_type,
            name: String::new(),
            note: String::new(),
            icon: String::new(),
            paused: false,
            config: Map::new(),
            end_life: EndLife::default(),
            hub: Hub::new(),
            imp_actual: 0,
        }
    }

    /// Builder-style hub setter.
    pub fn with_hub(mut self, hub: Hub) -> Self {
        self.hub = hub;
        self
    }

    /// Builder-style config entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Source channel of a trigger pipeline.
    pub fn config_channel_id(&self) -> Option<ChannelId> {
        self.config
            .get("channel_id")
            .and_then(Value::as_str)
            .map(ChannelId::from)
    }

    /// Whether the pipeline is past its time budget or has used up its
    /// impression budget, as seen at `now` (epoch seconds).
    pub fn is_expired(&self, now: i64) -> bool {
        let out_of_time = self.end_life.time > 0 && self.end_life.time < now;
        let out_of_imps = self.end_life.imp > 0 && self.imp_actual >= self.end_life.imp;
        out_of_time || out_of_imps
    }
}
