//! Transform hints.
//!
//! A hint is a stored default transform for an edge between two actions.
//! Owners can keep their own; system hints apply to everybody.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::store::{self, Collection, DocumentStore, Filter};
use crate::types::{AccountContext, TransformMap};

/// Default transform for `from_channel → to_channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformDefault {
    /// Owning account, or the system owner.
    pub owner_id: String,
    /// Source action.
    pub from_channel: String,
    /// Target action.
    pub to_channel: String,
    /// Import key → template.
    #[serde(default)]
    pub transform: TransformMap,
}

impl TransformDefault {
    fn key(&self) -> Filter {
        Filter::eq("owner_id", self.owner_id.as_str())
            .and(Filter::eq("from_channel", self.from_channel.as_str()))
            .and(Filter::eq("to_channel", self.to_channel.as_str()))
    }
}

/// Reads and writes transform hints.
pub struct TransformHints<S: DocumentStore> {
    store: Arc<S>,
    system_owner_id: String,
}

impl<S: DocumentStore + 'static> TransformHints<S> {
    /// Create a hint service.
    pub fn new(store: Arc<S>, config: &KernelConfig) -> Self {
        Self {
            store,
            system_owner_id: config.system_owner_id.clone(),
        }
    }

    /// Hint for an edge, from the account's own hints or the system's.
    ///
    /// Candidates are ordered by owner id and the first one wins.
    pub async fn get_transform_hint(
        &self,
        account: &AccountContext,
        from: &str,
        to: &str,
    ) -> Result<Option<TransformDefault>, KernelError> {
        let owners = Filter::eq("owner_id", account.owner_id.as_str())
            .or(Filter::eq("owner_id", self.system_owner_id.as_str()));
        let filter = owners
            .and(Filter::eq("from_channel", from))
            .and(Filter::eq("to_channel", to));

        let mut candidates: Vec<TransformDefault> =
            store::find_all(self.store.as_ref(), Collection::TransformDefault, &filter).await?;
        candidates.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));

        Ok(candidates.into_iter().next())
    }

    /// Create or replace the hint for `(owner, from, to)`.
    pub async fn set_transform_defaults(&self, hint: &TransformDefault) -> Result<(), KernelError> {
        let key = hint.key();
        let existing: Option<TransformDefault> =
            store::find_one(self.store.as_ref(), Collection::TransformDefault, &key).await?;
        let doc = serde_json::to_value(hint)?;

        if existing.is_some() {
            self.store
                .update_by_filter(Collection::TransformDefault, &key, doc)
                .await
                .map_err(KernelError::from_store)?;
        } else {
            self.store
                .insert(Collection::TransformDefault, doc)
                .await
                .map_err(KernelError::from_store)?;
        }

        tracing::debug!(
            owner_id = %hint.owner_id,
            from = %hint.from_channel,
            to = %hint.to_channel,
            replaced = existing.is_some(),
            "Stored transform hint"
        );
        Ok(())
    }
}
