//! In-process document store.
//!
//! Documents live in a `BTreeMap` keyed by full path behind a
//! [`tokio::sync::RwLock`]. Every committed write bumps a global revision
//! counter; transactions remember the revision of everything they read and
//! refuse to commit if any of it moved. Used by tests and by the `memory`
//! backend for local development.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::document::{
    CollectionPath, DocumentPath, DocumentStore, SetMode, StoreError, Transaction, apply_set,
};

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, StoredDoc>,
    /// Revision stamped on the most recent write.
    revision: u64,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    collection: String,
    id: String,
    revision: u64,
    data: Value,
}

/// Document store kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a document directly, outside any transaction.
    ///
    /// Handy for seeding collaborator data such as event records.
    pub async fn put(&self, path: &DocumentPath, value: Value) {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        let revision = inner.revision;
        inner.docs.insert(
            path.to_string(),
            StoredDoc {
                collection: path.parent().to_string(),
                id: path.id().to_string(),
                revision,
                data: value,
            },
        );
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.docs.is_empty()
    }
}

fn scan(inner: &Inner, collection: &CollectionPath) -> Vec<(String, u64, Value)> {
    let prefix = format!("{collection}/");
    inner
        .docs
        .range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter(|(_, doc)| doc.collection == collection.as_str())
        .map(|(_, doc)| (doc.id.clone(), doc.revision, doc.data.clone()))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.docs.get(&path.to_string()).map(|doc| doc.data.clone()))
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Value)>, StoreError> {
        let inner = self.inner.read().await;
        Ok(scan(&inner, collection)
            .into_iter()
            .map(|(id, _, data)| (id, data))
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            reads: BTreeMap::new(),
            scans: BTreeMap::new(),
            writes: Vec::new(),
            committed: false,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug)]
enum Write {
    Set {
        path: DocumentPath,
        value: Value,
        mode: SetMode,
    },
    Delete(DocumentPath),
}

/// Transaction over a [`MemoryDocumentStore`].
///
/// Reads see committed state; writes are buffered until commit.
#[derive(Debug)]
pub struct MemoryTransaction {
    inner: Arc<RwLock<Inner>>,
    /// Revision of each document read, `None` when it was absent.
    reads: BTreeMap<String, Option<u64>>,
    /// Membership of each scanned collection at scan time.
    scans: BTreeMap<CollectionPath, Vec<String>>,
    writes: Vec<Write>,
    committed: bool,
}

impl MemoryTransaction {
    fn validate(&self, inner: &Inner) -> bool {
        let reads_hold = self.reads.iter().all(|(path, seen)| {
            inner.docs.get(path).map(|doc| doc.revision) == *seen
        });
        let scans_hold = self.scans.iter().all(|(collection, ids)| {
            let now: Vec<String> = scan(inner, collection)
                .into_iter()
                .map(|(id, _, _)| id)
                .collect();
            now == *ids
        });
        reads_hold && scans_hold
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().await;
        let key = path.to_string();
        let doc = inner.docs.get(&key);
        self.reads.insert(key, doc.map(|d| d.revision));
        Ok(doc.map(|d| d.data.clone()))
    }

    async fn list(
        &mut self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let inner = self.inner.read().await;
        let docs = scan(&inner, collection);
        let mut ids = Vec::with_capacity(docs.len());
        let mut out = Vec::with_capacity(docs.len());
        for (id, revision, data) in docs {
            self.reads
                .insert(format!("{collection}/{id}"), Some(revision));
            ids.push(id.clone());
            out.push((id, data));
        }
        self.scans.insert(collection.clone(), ids);
        Ok(out)
    }

    async fn set(
        &mut self,
        path: &DocumentPath,
        value: Value,
        mode: SetMode,
    ) -> Result<(), StoreError> {
        self.writes.push(Write::Set {
            path: path.clone(),
            value,
            mode,
        });
        Ok(())
    }

    async fn delete(&mut self, path: &DocumentPath) -> Result<(), StoreError> {
        self.writes.push(Write::Delete(path.clone()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if self.committed {
            return Err(StoreError::Unavailable(
                "transaction already committed".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        if !self.validate(&inner) {
            return Err(StoreError::Aborted);
        }

        inner.revision += 1;
        let revision = inner.revision;
        for write in self.writes.drain(..) {
            match write {
                Write::Set { path, value, mode } => {
                    let key = path.to_string();
                    let existing = inner.docs.remove(&key).map(|doc| doc.data);
                    let data = apply_set(existing, value, mode);
                    inner.docs.insert(
                        key,
                        StoredDoc {
                            collection: path.parent().to_string(),
                            id: path.id().to_string(),
                            revision,
                            data,
                        },
                    );
                }
                Write::Delete(path) => {
                    inner.docs.remove(&path.to_string());
                }
            }
        }
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> CollectionPath {
        CollectionPath::root("boards").doc("b1").collection("items")
    }

    #[tokio::test]
    async fn list_only_returns_direct_children() {
        let store = MemoryDocumentStore::new();
        let items = items();
        store.put(&items.doc("a"), json!({ "n": 1 })).await;
        store.put(&items.doc("b"), json!({ "n": 2 })).await;
        store
            .put(&items.doc("a").collection("notes").doc("x"), json!({}))
            .await;
        store
            .put(&CollectionPath::root("boards").doc("b1"), json!({}))
            .await;

        let Ok(listed) = store.list(&items).await else {
            panic!("list failed");
        };
        let ids: Vec<&str> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn commit_applies_all_writes() {
        let store = MemoryDocumentStore::new();
        let items = items();
        store.put(&items.doc("old"), json!({ "n": 0 })).await;

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let _ = tx.list(&items).await;
        let _ = tx.set(&items.doc("new"), json!({ "n": 1 }), SetMode::Overwrite).await;
        let _ = tx.delete(&items.doc("old")).await;
        assert!(tx.commit().await.is_ok());

        let Ok(listed) = store.list(&items).await else {
            panic!("list failed");
        };
        assert_eq!(listed, vec![("new".to_string(), json!({ "n": 1 }))]);
    }

    #[tokio::test]
    async fn merge_set_preserves_existing_fields() {
        let store = MemoryDocumentStore::new();
        let path = items().doc("a");
        store.put(&path, json!({ "keep": 1, "n": 1 })).await;

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let _ = tx.set(&path, json!({ "n": 2 }), SetMode::Merge).await;
        assert!(tx.commit().await.is_ok());

        let Ok(Some(doc)) = store.get(&path).await else {
            panic!("document missing");
        };
        assert_eq!(doc, json!({ "keep": 1, "n": 2 }));
    }

    #[tokio::test]
    async fn commit_aborts_when_read_document_changed() {
        let store = MemoryDocumentStore::new();
        let path = items().doc("a");
        store.put(&path, json!({ "n": 1 })).await;

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let _ = tx.get(&path).await;
        let _ = tx.set(&items().doc("b"), json!({ "n": 9 }), SetMode::Overwrite).await;

        store.put(&path, json!({ "n": 2 })).await;

        assert!(matches!(tx.commit().await, Err(StoreError::Aborted)));
        let Ok(missing) = store.get(&items().doc("b")).await else {
            panic!("get failed");
        };
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn commit_aborts_when_absent_document_appeared() {
        let store = MemoryDocumentStore::new();
        let path = items().doc("a");

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(None) = tx.get(&path).await else {
            panic!("expected absent document");
        };
        let _ = tx.set(&path, json!({ "n": 1 }), SetMode::Overwrite).await;

        store.put(&path, json!({ "n": 2 })).await;

        assert!(matches!(tx.commit().await, Err(StoreError::Aborted)));
    }

    #[tokio::test]
    async fn commit_aborts_when_scanned_collection_grew() {
        let store = MemoryDocumentStore::new();
        let items = items();

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let _ = tx.list(&items).await;
        store.put(&items.doc("late"), json!({})).await;

        assert!(matches!(tx.commit().await, Err(StoreError::Aborted)));
    }

    #[tokio::test]
    async fn dropped_transaction_writes_nothing() {
        let store = MemoryDocumentStore::new();
        {
            let Ok(mut tx) = store.begin().await else {
                panic!("begin failed");
            };
            let _ = tx.set(&items().doc("a"), json!({}), SetMode::Overwrite).await;
        }
        assert!(store.is_empty().await);
    }
}
