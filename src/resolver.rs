//! Channel resolution.
//!
//! The only place that reads the channel directory. Graph-walking code loads
//! an owner-scoped [`ChannelResolver`] once and resolves every hub reference
//! against it; a miss means "drop this reference", never an error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::KernelError;
use crate::store::{self, Collection, DocumentStore, Filter};
use crate::types::{normalize_key, Channel, ChannelId, Hub, SourceKey};

/// Lookup surface over the accounts' channels.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Every channel owned by `owner_id`.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Channel>, KernelError>;

    /// Action of one of `owner_id`'s channels.
    async fn resolve(&self, owner_id: &str, channel_id: &ChannelId) -> Result<Option<String>, KernelError>;

    /// Every channel, across owners, bound to `action`.
    async fn find_by_action(&self, action: &str) -> Result<Vec<Channel>, KernelError>;
}

/// Channel directory backed by the `channel` collection.
pub struct StoreChannelDirectory<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> StoreChannelDirectory<S> {
    /// Create a directory over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DocumentStore + 'static> ChannelDirectory for StoreChannelDirectory<S> {
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Channel>, KernelError> {
        store::find_all(self.store.as_ref(), Collection::Channel, &Filter::eq("owner_id", owner_id)).await
    }

    async fn resolve(&self, owner_id: &str, channel_id: &ChannelId) -> Result<Option<String>, KernelError> {
        let filter = Filter::eq("owner_id", owner_id).and(Filter::eq("id", channel_id.as_str()));
        let channel: Option<Channel> = store::find_one(self.store.as_ref(), Collection::Channel, &filter).await?;
        Ok(channel.map(|c| c.action))
    }

    async fn find_by_action(&self, action: &str) -> Result<Vec<Channel>, KernelError> {
        store::find_all(self.store.as_ref(), Collection::Channel, &Filter::eq("action", action)).await
    }
}

/// Outcome of resolving a hub key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The pipeline's own source marker.
    Source,
    /// The channel's portable action.
    Action(&'a str),
    /// No such channel for this owner.
    Miss,
}

/// Owner-scoped `channel id → action` snapshot.
#[derive(Debug, Clone, Default)]
pub struct ChannelResolver {
    owner_id: String,
    actions: BTreeMap<ChannelId, String>,
}

impl ChannelResolver {
    /// Build from channels; channels of other owners are ignored and the
    /// first occurrence of a duplicated id wins.
    pub fn new<I>(owner_id: impl Into<String>, channels: I) -> Self
    where
        I: IntoIterator<Item = Channel>,
    {
        let owner_id = owner_id.into();
        let mut actions = BTreeMap::new();
        for channel in channels {
            if channel.owner_id != owner_id {
                tracing::debug!(
                    owner_id = %owner_id,
                    channel_id = %channel.id,
                    "Ignoring channel owned by another account"
                );
                continue;
            }
            actions.entry(channel.id).or_insert(channel.action);
        }
        Self { owner_id, actions }
    }

    /// Load `owner_id`'s channels through a directory.
    pub async fn load<D>(directory: &D, owner_id: &str) -> Result<Self, KernelError>
    where
        D: ChannelDirectory + ?Sized,
    {
        let channels = directory.list_by_owner(owner_id).await?;
        Ok(Self::new(owner_id, channels))
    }

    /// Owner this snapshot belongs to.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Resolve a hub key.
    pub fn resolve(&self, key: &SourceKey) -> Resolution<'_> {
        match key {
            SourceKey::Source => Resolution::Source,
            SourceKey::Channel(id) => self.action(id).map_or(Resolution::Miss, Resolution::Action),
        }
    }

    /// Action of a channel id.
    pub fn action(&self, id: &ChannelId) -> Option<&str> {
        self.actions.get(id).map(String::as_str)
    }

    /// First channel (by id) bound to `action`.
    ///
    /// Matches on the normalized form so keys exported as `"slack-post"`
    /// find a `"slack.post"` channel.
    pub fn channel_for_action(&self, action: &str) -> Option<&ChannelId> {
        let wanted = normalize_key(action);
        self.actions
            .iter()
            .find(|(_, a)| normalize_key(a) == wanted)
            .map(|(id, _)| id)
    }

    /// Whether the owner has this channel.
    pub fn contains(&self, id: &ChannelId) -> bool {
        self.actions.contains_key(id)
    }

    /// References in `hub` this owner has no channel for, as a
    /// [`KernelError::ValidationMiss`]. Graph walks skip them; the error is
    /// only reported, never returned.
    pub fn dangling(&self, hub: &Hub) -> Option<KernelError> {
        let missing = hub.dangling(|id| self.contains(id));
        if missing.is_empty() {
            return None;
        }
        let ids: Vec<&str> = missing.iter().map(ChannelId::as_str).collect();
        Some(KernelError::ValidationMiss(ids.join(", ")))
    }

    /// Number of known channels.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no channels are known.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;

    fn store() -> Arc<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new();
        for channel in [
            Channel::new("c1", "o1", "slack.post"),
            Channel::new("c2", "o1", "rss.read"),
            Channel::new("c3", "o2", "slack.post"),
        ] {
            store.seed_value(Collection::Channel, &channel).unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn test_resolve() {
        let resolver = ChannelResolver::new("o1", vec![Channel::new("c1", "o1", "slack.post")]);
        assert_eq!(resolver.resolve(&SourceKey::Source), Resolution::Source);
        assert_eq!(resolver.resolve(&SourceKey::from("c1")), Resolution::Action("slack.post"));
        assert_eq!(resolver.resolve(&SourceKey::from("zz")), Resolution::Miss);
    }

    #[test]
    fn test_ignores_foreign_channels_and_keeps_first() {
        let resolver = ChannelResolver::new(
            "o1",
            vec![
                Channel::new("c1", "o1", "slack.post"),
                Channel::new("c1", "o1", "email.smtp_forward"),
                Channel::new("c9", "o2", "rss.read"),
            ],
        );
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.action(&ChannelId::new("c1")), Some("slack.post"));
        assert!(!resolver.contains(&ChannelId::new("c9")));
    }

    #[test]
    fn test_dangling_reports_unknown_references() {
        let resolver = ChannelResolver::new("o1", vec![Channel::new("c1", "o1", "slack.post")]);
        let hub = Hub::new()
            .with("source", crate::types::HubNode::with_edges(["c1", "gone"]))
            .with("stale", crate::types::HubNode::with_edges(["c1"]));

        let miss = resolver.dangling(&hub).unwrap();
        assert!(matches!(&miss, KernelError::ValidationMiss(ids) if ids == "gone, stale"));
        assert_eq!(miss.status_hint(), 422);

        let clean = Hub::new().with("source", crate::types::HubNode::with_edges(["c1"]));
        assert!(resolver.dangling(&clean).is_none());
    }

    #[test]
    fn test_channel_for_action() {
        let resolver = ChannelResolver::new(
            "o1",
            vec![
                Channel::new("c2", "o1", "slack.post"),
                Channel::new("c1", "o1", "slack.post"),
            ],
        );
        assert_eq!(resolver.channel_for_action("slack-post"), Some(&ChannelId::new("c1")));
        assert_eq!(resolver.channel_for_action("slack.post"), Some(&ChannelId::new("c1")));
        assert_eq!(resolver.channel_for_action("rss.read"), None);
    }

    #[tokio::test]
    async fn test_store_directory() {
        let directory = StoreChannelDirectory::new(store());

        assert_eq!(directory.list_by_owner("o1").await.unwrap().len(), 2);
        assert_eq!(
            directory.resolve("o1", &ChannelId::new("c2")).await.unwrap().as_deref(),
            Some("rss.read")
        );
        assert_eq!(directory.resolve("o1", &ChannelId::new("c3")).await.unwrap(), None);
        assert_eq!(directory.find_by_action("slack.post").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load() {
        let directory = StoreChannelDirectory::new(store());
        let resolver = ChannelResolver::load(&directory, "o2").await.unwrap();
        assert_eq!(resolver.owner_id(), "o2");
        assert_eq!(resolver.action(&ChannelId::new("c3")), Some("slack.post"));
    }
}
