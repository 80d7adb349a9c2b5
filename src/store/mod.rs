//! Document store backends.
//!
//! The kernel treats persistence as an abstract document store: JSON
//! documents grouped in collections, addressed by [`Filter`]s. "Not found"
//! is an empty result, never an error.

pub mod filter;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use crate::error::KernelError;

pub use filter::Filter;
pub use memory::InMemoryDocumentStore;

/// Collections the kernel reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    /// Accounts (`{id, name}`).
    Account,
    /// Per-owner options, including expiry preference.
    AccountOption,
    /// Pipelines.
    Bip,
    /// Pipeline shares.
    BipShare,
    /// Channels.
    Channel,
    /// Daily network chord stats.
    StatsAccountNetwork,
    /// Transform hints.
    TransformDefault,
}

impl Collection {
    /// Collection name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::AccountOption => "account_option",
            Self::Bip => "bip",
            Self::BipShare => "bip_share",
            Self::Channel => "channel",
            Self::StatsAccountNetwork => "stats_account_network",
            Self::TransformDefault => "transform_default",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for paged reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Dotted field path.
    pub field: String,
    /// Descending when true.
    pub descending: bool,
}

impl Sort {
    /// Ascending by `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: false }
    }

    /// Descending by `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: true }
    }
}

/// A paged read request. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u64,
    /// Documents per page.
    pub page_size: u64,
    /// Sort order.
    pub sort: Sort,
}

impl PageRequest {
    /// Number of documents to skip. Saturates, so huge pages read past the end.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// One page of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Documents matching the filter, across all pages.
    pub total: u64,
    /// Documents on this page.
    pub documents: Vec<Value>,
}

/// Trait for document storage backends.
///
/// Writes return the number of affected documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync;

    /// First document matching the filter.
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Option<Value>, Self::Error>;

    /// Every document matching the filter.
    async fn find_filter(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, Self::Error>;

    /// One sorted page of documents matching the filter.
    async fn find_page(
        &self,
        collection: Collection,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<Page, Self::Error>;

    /// Insert a document, assigning an `id` when it has none. Returns the id.
    async fn insert(&self, collection: Collection, doc: Value) -> Result<String, Self::Error>;

    /// Set every (dotted) field of `patch` on each matching document.
    async fn update_by_filter(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Value,
    ) -> Result<u64, Self::Error>;

    /// Delete every matching document.
    async fn remove_by_filter(&self, collection: Collection, filter: &Filter) -> Result<u64, Self::Error>;
}

/// Fetch and decode the first matching document.
pub async fn find_one<S, T>(store: &S, collection: Collection, filter: &Filter) -> Result<Option<T>, KernelError>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    match store.find(collection, filter).await.map_err(KernelError::from_store)? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// Fetch and decode every matching document.
///
/// Documents that do not decode are logged and skipped so one malformed
/// row cannot hide the rest of a collection.
pub async fn find_all<S, T>(store: &S, collection: Collection, filter: &Filter) -> Result<Vec<T>, KernelError>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    let docs = store
        .find_filter(collection, filter)
        .await
        .map_err(KernelError::from_store)?;

    Ok(docs
        .into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(%collection, error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect())
}
