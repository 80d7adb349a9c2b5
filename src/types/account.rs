//! Account-side types consumed by the kernel.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::KernelError;

/// The requesting account, passed explicitly into every owner-scoped
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    /// Account id.
    pub owner_id: String,
    /// Display name, copied into shares.
    #[serde(default)]
    pub owner_name: String,
    /// Domains the account may publish under.
    #[serde(default)]
    pub domain_ids: Vec<String>,
}

impl AccountContext {
    /// Create a context with no domains.
    pub fn new(owner_id: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_name: owner_name.into(),
            domain_ids: Vec::new(),
        }
    }
}

/// Account row; only the id is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// What to do with expired pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryMode {
    /// Set `paused = true`.
    Pause,
    /// Remove the pipeline.
    Delete,
}

impl ExpiryMode {
    /// Parse a stored preference, rejecting anything outside the enumeration.
    pub fn parse(owner_id: &str, value: &str) -> Result<Self, KernelError> {
        match value {
            "pause" => Ok(Self::Pause),
            "delete" => Ok(Self::Delete),
            other => Err(KernelError::PolicyMismatch {
                owner_id: owner_id.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExpiryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Per-owner options row holding the expiry preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOption {
    /// Account id.
    pub owner_id: String,
    /// IANA timezone name.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Raw expiry preference; parsed with [`ExpiryMode::parse`].
    #[serde(default)]
    pub bip_expire_behaviour: String,
}

impl AccountOption {
    /// Create an options row.
    pub fn new(
        owner_id: impl Into<String>,
        timezone: Option<&str>,
        bip_expire_behaviour: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            timezone: timezone.map(str::to_string),
            bip_expire_behaviour: bip_expire_behaviour.into(),
        }
    }

    /// Parsed expiry preference.
    pub fn expiry_mode(&self) -> Result<ExpiryMode, KernelError> {
        ExpiryMode::parse(&self.owner_id, &self.bip_expire_behaviour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_mode_parse() {
        assert_eq!(ExpiryMode::parse("o1", "pause").unwrap(), ExpiryMode::Pause);
        assert_eq!(ExpiryMode::parse("o1", "delete").unwrap(), ExpiryMode::Delete);

        let err = ExpiryMode::parse("o1", "archive").unwrap_err();
        assert!(matches!(err, KernelError::PolicyMismatch { .. }));
    }
}
