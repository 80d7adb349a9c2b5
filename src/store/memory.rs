//! In-memory document store for testing.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::filter::{assign, compare_values, lookup};
use super::{Collection, DocumentStore, Filter, Page, PageRequest};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Document is not a JSON object.
    #[error("Document is not an object")]
    NotAnObject,
    /// Patch could not be applied to a matching document.
    #[error("Cannot set {0} on document")]
    BadPatch(String),
    /// Failure injected for an owner.
    #[error("Injected failure for owner {0}")]
    OwnerFailure(String),
    /// Failure injected for a collection.
    #[error("Injected failure for collection {0}")]
    CollectionFailure(Collection),
}

/// In-memory document store for testing.
///
/// Documents keep insertion order. Failures can be injected per owner (any
/// call whose filter pins `owner_id`, or any insert of a document owned by
/// that owner) or per collection.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<Collection, Vec<Value>>>,
    failing_owners: RwLock<BTreeSet<String>>,
    failing_collections: RwLock<BTreeSet<Collection>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without going through the async API.
    pub fn seed(&self, collection: Collection, doc: Value) {
        self.collections.write().entry(collection).or_default().push(doc);
    }

    /// Seed any serializable value.
    pub fn seed_value<T: serde::Serialize>(&self, collection: Collection, value: &T) -> Result<(), serde_json::Error> {
        self.seed(collection, serde_json::to_value(value)?);
        Ok(())
    }

    /// Snapshot of a collection.
    pub fn all(&self, collection: Collection) -> Vec<Value> {
        self.collections
            .read()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.collections.read().get(&collection).map_or(0, Vec::len)
    }

    /// Make every call scoped to `owner_id` fail.
    pub fn fail_owner(&self, owner_id: impl Into<String>) {
        self.failing_owners.write().insert(owner_id.into());
    }

    /// Make every call on `collection` fail.
    pub fn fail_collection(&self, collection: Collection) {
        self.failing_collections.write().insert(collection);
    }

    fn check(&self, collection: Collection, owner: Option<&Value>) -> Result<(), InMemoryError> {
        if self.failing_collections.read().contains(&collection) {
            return Err(InMemoryError::CollectionFailure(collection));
        }
        if let Some(owner) = owner.and_then(Value::as_str) {
            if self.failing_owners.read().contains(owner) {
                return Err(InMemoryError::OwnerFailure(owner.to_string()));
            }
        }
        Ok(())
    }

    fn matching(&self, collection: Collection, filter: &Filter) -> Vec<Value> {
        self.collections
            .read()
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    type Error = InMemoryError;

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Option<Value>, Self::Error> {
        self.check(collection, filter.pinned("owner_id"))?;
        Ok(self.matching(collection, filter).into_iter().next())
    }

    async fn find_filter(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, Self::Error> {
        self.check(collection, filter.pinned("owner_id"))?;
        Ok(self.matching(collection, filter))
    }

    async fn find_page(
        &self,
        collection: Collection,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<Page, Self::Error> {
        self.check(collection, filter.pinned("owner_id"))?;

        let mut docs = self.matching(collection, filter);
        docs.sort_by(|a, b| {
            let ord = compare_values(lookup(a, &page.sort.field), lookup(b, &page.sort.field));
            if page.sort.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let total = docs.len() as u64;
        let documents = docs
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.page_size).unwrap_or(usize::MAX))
            .collect();

        Ok(Page { total, documents })
    }

    async fn insert(&self, collection: Collection, mut doc: Value) -> Result<String, Self::Error> {
        self.check(collection, doc.get("owner_id"))?;

        let object = doc.as_object_mut().ok_or(InMemoryError::NotAnObject)?;
        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                object.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        self.collections.write().entry(collection).or_default().push(doc);
        Ok(id)
    }

    async fn update_by_filter(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Value,
    ) -> Result<u64, Self::Error> {
        self.check(collection, filter.pinned("owner_id"))?;
        let fields = patch.as_object().ok_or(InMemoryError::NotAnObject)?;

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        // Patch copies first so a bad patch leaves every document untouched.
        let patched = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| filter.matches(d))
            .map(|(index, doc)| {
                let mut doc = doc.clone();
                for (path, value) in fields {
                    if !assign(&mut doc, path, value.clone()) {
                        return Err(InMemoryError::BadPatch(path.clone()));
                    }
                }
                Ok((index, doc))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let affected = patched.len() as u64;
        for (index, doc) in patched {
            docs[index] = doc;
        }
        Ok(affected)
    }

    async fn remove_by_filter(&self, collection: Collection, filter: &Filter) -> Result<u64, Self::Error> {
        self.check(collection, filter.pinned("owner_id"))?;

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Sort;
    use serde_json::json;

    fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store.seed(Collection::Bip, json!({ "id": "b1", "owner_id": "o1", "name": "beta", "paused": false }));
        store.seed(Collection::Bip, json!({ "id": "b2", "owner_id": "o1", "name": "alpha", "paused": true }));
        store.seed(Collection::Bip, json!({ "id": "b3", "owner_id": "o2", "name": "gamma", "paused": false }));
        store
    }

    #[tokio::test]
    async fn test_find_and_find_filter() {
        let store = seeded();
        let found = store.find(Collection::Bip, &Filter::eq("id", "b2")).await.unwrap();
        assert_eq!(found.unwrap()["name"], "alpha");

        let owned = store
            .find_filter(Collection::Bip, &Filter::eq("owner_id", "o1"))
            .await
            .unwrap();
        assert_eq!(owned.len(), 2);

        let none = store.find(Collection::Channel, &Filter::all()).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert(Collection::Channel, json!({ "action": "rss.read" })).await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        let kept = store.insert(Collection::Channel, json!({ "id": "c1" })).await.unwrap();
        assert_eq!(kept, "c1");
        assert_eq!(store.count(Collection::Channel), 2);
    }

    #[tokio::test]
    async fn test_update_by_filter_sets_dotted_fields() {
        let store = seeded();
        let affected = store
            .update_by_filter(
                Collection::Bip,
                &Filter::eq("owner_id", "o1"),
                json!({ "paused": true, "end_life.imp": 3 }),
            )
            .await
            .unwrap();

        assert_eq!(affected, 2);
        let docs = store.all(Collection::Bip);
        assert_eq!(docs[0]["paused"], true);
        assert_eq!(docs[0]["end_life"]["imp"], 3);
        assert_eq!(docs[2]["paused"], false);
    }

    #[tokio::test]
    async fn test_remove_by_filter() {
        let store = seeded();
        let removed = store
            .remove_by_filter(Collection::Bip, &Filter::eq("paused", true))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Collection::Bip), 2);
    }

    #[tokio::test]
    async fn test_find_page_sorts_and_slices() {
        let store = seeded();
        let request = PageRequest { page: 1, page_size: 2, sort: Sort::asc("name") };
        let page = store.find_page(Collection::Bip, &Filter::all(), &request).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0]["name"], "alpha");

        let request = PageRequest { page: 2, page_size: 2, sort: Sort::asc("name") };
        let page = store.find_page(Collection::Bip, &Filter::all(), &request).await.unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0]["name"], "gamma");
    }

    #[tokio::test]
    async fn test_find_page_past_the_end() {
        let store = seeded();
        let request = PageRequest { page: u64::MAX, page_size: 10, sort: Sort::asc("name") };
        let page = store.find_page(Collection::Bip, &Filter::all(), &request).await.unwrap();

        assert_eq!(page.total, 3);
        assert!(page.documents.is_empty());
    }

    #[tokio::test]
    async fn test_bad_patch_leaves_store_untouched() {
        let store = InMemoryDocumentStore::new();
        store.seed(Collection::Bip, json!({ "id": "b1", "owner_id": "o1", "end_life": { "imp": 0 } }));
        store.seed(Collection::Bip, json!({ "id": "b2", "owner_id": "o1", "end_life": 7 }));

        let result = store
            .update_by_filter(Collection::Bip, &Filter::eq("owner_id", "o1"), json!({ "end_life.imp": 3 }))
            .await;

        assert!(matches!(result, Err(InMemoryError::BadPatch(path)) if path == "end_life.imp"));
        let docs = store.all(Collection::Bip);
        assert_eq!(docs[0]["end_life"]["imp"], 0);
        assert_eq!(docs[1]["end_life"], 7);
    }

    #[tokio::test]
    async fn test_injected_owner_failure() {
        let store = seeded();
        store.fail_owner("o2");

        assert!(store.find_filter(Collection::Bip, &Filter::eq("owner_id", "o2")).await.is_err());
        assert!(store.find_filter(Collection::Bip, &Filter::eq("owner_id", "o1")).await.is_ok());
        assert!(store.insert(Collection::Bip, json!({ "owner_id": "o2" })).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_collection_failure() {
        let store = seeded();
        store.fail_collection(Collection::Bip);
        assert!(store.find_filter(Collection::Bip, &Filter::all()).await.is_err());
        assert!(store.find_filter(Collection::Channel, &Filter::all()).await.is_ok());
    }
}
