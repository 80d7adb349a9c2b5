//! Network chord statistics.
//!
//! Every resolved edge of an account's pipelines counts as one
//! `from action → to action` chord. Daily per-account maps are merged into
//! the store additively, and a system-wide rollup sums them across accounts.

use chrono::{NaiveDate, Utc};
use futures_util::future::{join_all, try_join};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::resolver::{ChannelDirectory, ChannelResolver};
use crate::store::{self, Collection, DocumentStore, Filter};
use crate::types::{Account, BipType, ChordMap, NetworkStat, Pipeline, SourceKey};

/// Chord counts for a set of pipelines.
///
/// The `source` entry counts from the trigger's channel action (skipped
/// when that channel is unknown) or from the `bip.<type>` pseudo action.
/// Unknown channels, as sources or targets, are skipped.
pub fn chord_map_for(pipelines: &[Pipeline], resolver: &ChannelResolver) -> ChordMap {
    let mut chords = ChordMap::new();

    for pipeline in pipelines {
        if let Some(miss) = resolver.dangling(&pipeline.hub) {
            tracing::debug!(bip_id = %pipeline.id, error = %miss, "Skipping dangling references in chords");
        }
        for (key, node) in pipeline.hub.iter() {
            let from = match key {
                SourceKey::Source => match &pipeline.bip_type {
                    BipType::Trigger => pipeline
                        .config_channel_id()
                        .and_then(|id| resolver.action(&id).map(str::to_string)),
                    other => Some(other.pseudo_action()),
                },
                SourceKey::Channel(id) => resolver.action(id).map(str::to_string),
            };
            let Some(from) = from else {
                continue;
            };

            for to in node.edges.iter().filter_map(|edge| resolver.action(edge)) {
                chords.increment(&from, to);
            }
        }
    }

    chords
}

/// One account the hub rollup could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    /// Account id.
    pub owner_id: String,
    /// Rendered error.
    pub error: String,
}

/// Outcome of a hub-wide stats run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStatsSummary {
    /// Accounts visited.
    pub accounts: usize,
    /// Accounts with at least one chord.
    pub active: usize,
    /// Accounts that failed and were left out of the rollup.
    pub failed: Vec<AccountFailure>,
    /// Summed chord counts.
    pub chords: ChordMap,
    /// Whether the system row was written.
    pub system_written: bool,
}

/// Builds and persists daily chord stats.
pub struct NetworkStatsAggregator<S: DocumentStore, D: ChannelDirectory> {
    store: Arc<S>,
    directory: Arc<D>,
    system_owner_id: String,
}

impl<S, D> NetworkStatsAggregator<S, D>
where
    S: DocumentStore + 'static,
    D: ChannelDirectory + 'static,
{
    /// Create an aggregator.
    pub fn new(store: Arc<S>, directory: Arc<D>, config: &KernelConfig) -> Self {
        Self {
            store,
            directory,
            system_owner_id: config.system_owner_id.clone(),
        }
    }

    /// Stats for one account, recorded against today (UTC).
    pub async fn generate_account_stats(&self, owner_id: &str) -> Result<ChordMap, KernelError> {
        self.generate_account_stats_on(owner_id, Utc::now().date_naive()).await
    }

    /// Stats for one account, recorded against `day`. Empty maps are not
    /// written.
    pub async fn generate_account_stats_on(&self, owner_id: &str, day: NaiveDate) -> Result<ChordMap, KernelError> {
        let (resolver, pipelines) = try_join(
            ChannelResolver::load(self.directory.as_ref(), owner_id),
            store::find_all::<_, Pipeline>(self.store.as_ref(), Collection::Bip, &Filter::eq("owner_id", owner_id)),
        )
        .await?;

        let chords = chord_map_for(&pipelines, &resolver);
        if chords.is_empty() {
            tracing::debug!(owner_id, pipelines = pipelines.len(), "No network activity");
            return Ok(chords);
        }

        self.set_network_chord_stat(owner_id, day, &chords).await?;
        tracing::debug!(owner_id, chords = chords.len(), "Recorded network activity");
        Ok(chords)
    }

    /// Hub-wide stats for today (UTC).
    pub async fn generate_hub_stats(&self) -> Result<HubStatsSummary, KernelError> {
        self.generate_hub_stats_on(Utc::now().date_naive()).await
    }

    /// Run every account concurrently and merge the results into the
    /// system row for `day`.
    ///
    /// A failing account is logged and reported but does not stop the run.
    pub async fn generate_hub_stats_on(&self, day: NaiveDate) -> Result<HubStatsSummary, KernelError> {
        let accounts: Vec<Account> = store::find_all(self.store.as_ref(), Collection::Account, &Filter::all()).await?;

        let results = join_all(accounts.iter().map(|account| async move {
            let result = self.generate_account_stats_on(&account.id, day).await;
            (account.id.as_str(), result)
        }))
        .await;

        let mut summary = HubStatsSummary {
            accounts: accounts.len(),
            ..HubStatsSummary::default()
        };
        for (owner_id, result) in results {
            match result {
                Ok(chords) => {
                    if !chords.is_empty() {
                        summary.active += 1;
                    }
                    summary.chords.merge(&chords);
                }
                Err(e) => {
                    tracing::warn!(owner_id, error = %e, "Account stats failed");
                    summary.failed.push(AccountFailure {
                        owner_id: owner_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !summary.chords.is_empty() {
            self.set_network_chord_stat(&self.system_owner_id, day, &summary.chords)
                .await?;
            summary.system_written = true;
        }

        tracing::info!(
            accounts = summary.accounts,
            active = summary.active,
            failed = summary.failed.len(),
            chords = summary.chords.len(),
            "Hub stats generated"
        );
        Ok(summary)
    }

    /// Merge `chords` into `owner_id`'s row for `day`, creating it if needed.
    pub async fn set_network_chord_stat(
        &self,
        owner_id: &str,
        day: NaiveDate,
        chords: &ChordMap,
    ) -> Result<NetworkStat, KernelError> {
        let filter = Filter::eq("owner_id", owner_id).and(Filter::eq("day", day.format("%Y-%m-%d").to_string()));
        let now = Utc::now().timestamp();

        let existing: Option<NetworkStat> =
            store::find_one(self.store.as_ref(), Collection::StatsAccountNetwork, &filter).await?;

        match existing {
            Some(mut stat) => {
                stat.data.merge(chords);
                stat.updated_at = now;

                let mut patch = Map::new();
                patch.insert("data".to_string(), serde_json::to_value(&stat.data)?);
                patch.insert("updated_at".to_string(), Value::from(now));
                self.store
                    .update_by_filter(Collection::StatsAccountNetwork, &filter, Value::Object(patch))
                    .await
                    .map_err(KernelError::from_store)?;
                Ok(stat)
            }
            None => {
                let stat = NetworkStat {
                    owner_id: owner_id.to_string(),
                    day,
                    data: chords.clone(),
                    updated_at: now,
                };
                self.store
                    .insert(Collection::StatsAccountNetwork, serde_json::to_value(&stat)?)
                    .await
                    .map_err(KernelError::from_store)?;
                Ok(stat)
            }
        }
    }
}
