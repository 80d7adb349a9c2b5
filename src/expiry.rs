//! Pipeline expiry.
//!
//! A pipeline expires when its time budget (`end_life.time`, absolute epoch
//! seconds) has passed or its impression budget
//! (`end_life.imp`) is used up. Each owner's expired pipelines are paused or
//! deleted according to that owner's preference.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::store::{self, Collection, DocumentStore, Filter};
use crate::types::{AccountOption, ExpiryMode};

/// What a sweep did to one owner's pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// This many pipelines were paused.
    Paused(u64),
    /// This many pipelines were deleted.
    Deleted(u64),
}

impl ExpiryAction {
    /// Pipelines affected.
    pub fn count(&self) -> u64 {
        match self {
            Self::Paused(n) | Self::Deleted(n) => *n,
        }
    }
}

/// Per-owner sweep outcome.
#[derive(Debug)]
pub struct OwnerExpiry {
    /// Owner swept.
    pub owner_id: String,
    /// What happened, or why nothing did.
    pub result: Result<ExpiryAction, KernelError>,
}

/// Outcome of a full sweep.
#[derive(Debug, Default)]
pub struct ExpirySummary {
    /// One entry per options row, in store order.
    pub owners: Vec<OwnerExpiry>,
}

impl ExpirySummary {
    /// Pipelines paused or deleted across all owners.
    pub fn affected(&self) -> u64 {
        self.owners
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(ExpiryAction::count)
            .sum()
    }

    /// Owners whose sweep failed.
    pub fn failures(&self) -> impl Iterator<Item = &OwnerExpiry> {
        self.owners.iter().filter(|o| o.result.is_err())
    }
}

/// The owner's timezone, or `fallback` when it is missing or unknown.
///
/// Budgets are absolute epoch seconds, so the zone only labels the sweep.
pub fn owner_timezone(timezone: Option<&str>, fallback: Tz) -> Tz {
    match timezone {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(timezone = name, fallback = %fallback, "Unrecognized timezone");
            fallback
        }),
        None => fallback,
    }
}

/// Unpaused pipelines of `owner_id` that are expired at `now`.
pub fn expiry_filter(owner_id: &str, now: i64) -> Filter {
    let out_of_time = Filter::gt("end_life.time", 0.0).and(Filter::lt("end_life.time", now as f64));
    let out_of_imps = Filter::gt("end_life.imp", 0.0).and(Filter::field_gte("_imp_actual", "end_life.imp"));

    Filter::eq("owner_id", owner_id)
        .and(Filter::eq("paused", false))
        .and(out_of_time.or(out_of_imps))
}

/// Pauses or deletes expired pipelines.
pub struct ExpirySweeper<S: DocumentStore> {
    store: Arc<S>,
    fallback: Tz,
}

impl<S: DocumentStore + 'static> ExpirySweeper<S> {
    /// Create a sweeper.
    pub fn new(store: Arc<S>, config: &KernelConfig) -> Self {
        Self {
            store,
            fallback: config.fallback_timezone(),
        }
    }

    /// Sweep every owner that has an options row.
    ///
    /// Owners are swept concurrently; one owner's failure, including an
    /// unrecognized preference, is recorded and does not affect the others.
    pub async fn expire_all(&self, now: DateTime<Utc>) -> Result<ExpirySummary, KernelError> {
        let options: Vec<AccountOption> =
            store::find_all(self.store.as_ref(), Collection::AccountOption, &Filter::all()).await?;

        let owners = join_all(options.iter().map(|option| async move {
            OwnerExpiry {
                owner_id: option.owner_id.clone(),
                result: self.expire_owner(option, now).await,
            }
        }))
        .await;

        let summary = ExpirySummary { owners };
        for failure in summary.failures() {
            if let Err(e) = &failure.result {
                tracing::error!(owner_id = %failure.owner_id, error = %e, "Expiry sweep failed");
            }
        }
        tracing::info!(
            owners = summary.owners.len(),
            affected = summary.affected(),
            failed = summary.failures().count(),
            "Expiry sweep complete"
        );
        Ok(summary)
    }

    /// Pause or delete one pipeline regardless of its budgets.
    pub async fn expire_bip(&self, bip_id: &str, owner_id: &str, mode: ExpiryMode) -> Result<ExpiryAction, KernelError> {
        let filter = Filter::eq("owner_id", owner_id).and(Filter::eq("id", bip_id));
        let action = self.apply(&filter, mode).await?;
        if action.count() == 0 {
            return Err(KernelError::not_found("bip", bip_id));
        }

        tracing::info!(owner_id, bip_id, mode = %mode, "Pipeline expired");
        Ok(action)
    }

    async fn expire_owner(&self, option: &AccountOption, now: DateTime<Utc>) -> Result<ExpiryAction, KernelError> {
        let mode = option.expiry_mode()?;
        let tz = owner_timezone(option.timezone.as_deref(), self.fallback);
        let action = self.apply(&expiry_filter(&option.owner_id, now.timestamp()), mode).await?;

        tracing::debug!(
            owner_id = %option.owner_id,
            mode = %mode,
            local_time = %now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z"),
            affected = action.count(),
            "Swept owner"
        );
        Ok(action)
    }

    async fn apply(&self, filter: &Filter, mode: ExpiryMode) -> Result<ExpiryAction, KernelError> {
        let action = match mode {
            ExpiryMode::Pause => self
                .store
                .update_by_filter(Collection::Bip, filter, json!({ "paused": true }))
                .await
                .map(ExpiryAction::Paused),
            ExpiryMode::Delete => self
                .store
                .remove_by_filter(Collection::Bip, filter)
                .await
                .map(ExpiryAction::Deleted),
        };
        action.map_err(KernelError::from_store)
    }
}
