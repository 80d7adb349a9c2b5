//! Kernel configuration.
//!
//! All settings can be configured via environment variables:
//! - `HUB_KERNEL_SYSTEM_OWNER`: owner id of system-wide rows (default: `system`)
//! - `HUB_KERNEL_SHARE_PAGE_SIZE`: default share listing page size (default: 10)
//! - `HUB_KERNEL_DEFAULT_TZ`: timezone used when an owner's is missing or
//!   unrecognized (default: `UTC`)
//! - `LOG_FORMAT`: `json` or `pretty` (default: json)
//! - `RUST_LOG`: log filter (default: `bip_hub_kernel=info`)
//!
//! Components receive the config explicitly; nothing reads the environment
//! after construction.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::SYSTEM_OWNER_ID;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON, one event per line.
    Json,
    /// Human-readable output for local development.
    Pretty,
}

impl LogFormat {
    /// Parse a format name; anything but `pretty` is JSON.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("pretty") {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "bip_hub_kernel=info".to_string(),
        }
    }
}

/// Configuration shared by all kernel components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Owner id of system-wide stats rows and transform hints.
    pub system_owner_id: String,
    /// Default page size for share listings.
    pub share_page_size: u64,
    /// Fallback timezone for expiry sweeps.
    pub default_timezone: String,
    /// Logging.
    pub log: LogConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            system_owner_id: SYSTEM_OWNER_ID.to_string(),
            share_page_size: 10,
            default_timezone: "UTC".to_string(),
            log: LogConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            system_owner_id: std::env::var("HUB_KERNEL_SYSTEM_OWNER")
                .unwrap_or(defaults.system_owner_id),
            share_page_size: std::env::var("HUB_KERNEL_SHARE_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.share_page_size),
            default_timezone: std::env::var("HUB_KERNEL_DEFAULT_TZ")
                .unwrap_or(defaults.default_timezone),
            log: LogConfig {
                format: std::env::var("LOG_FORMAT")
                    .map(|s| LogFormat::from_name(&s))
                    .unwrap_or(defaults.log.format),
                filter: std::env::var("RUST_LOG").unwrap_or(defaults.log.filter),
            },
        }
    }

    /// The fallback timezone, or UTC when the configured name is unknown.
    pub fn fallback_timezone(&self) -> Tz {
        self.default_timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                timezone = %self.default_timezone,
                "Unrecognized default timezone, using UTC"
            );
            Tz::UTC
        })
    }
}
