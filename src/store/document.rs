//! Document store contract shared by all backends.
//!
//! A document is a JSON object addressed by a slash-separated path of
//! alternating collection and document segments
//! (`events/{event_id}/layout/meta`). Backends offer point reads,
//! collection scans, and transactions whose commit fails with
//! [`StoreError::Aborted`] if anything read inside them changed first.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Failure classes of a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A transaction lost a race with a concurrent writer. Safe to re-run.
    #[error("transaction aborted by a concurrent write")]
    Aborted,

    /// The transaction kept aborting until the attempt budget ran out.
    #[error("transaction still contended after {attempts} attempts")]
    Contention {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The backend could not be reached or rejected the operation.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// A stored document does not have the expected shape.
    #[error("corrupt document at {path}: {reason}")]
    Corrupt {
        /// Path of the offending document.
        path: String,
        /// Decoding failure.
        reason: String,
    },
}

/// How [`Transaction::set`] combines the new value with an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Overwrite,
    /// Recursively merge object fields; non-object values are replaced.
    Merge,
    /// Replace each given top-level field as a whole; other fields stay.
    Update,
}

/// Path of a collection (odd number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

/// Path of a single document (even number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl CollectionPath {
    /// A top-level collection such as `events`.
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The document `id` inside this collection.
    #[must_use]
    pub fn doc(&self, id: &str) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    /// Slash-joined representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocumentPath {
    /// A sub-collection nested under this document.
    #[must_use]
    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{self}/{name}"))
    }

    /// The collection that holds this document.
    #[must_use]
    pub fn parent(&self) -> &CollectionPath {
        &self.collection
    }

    /// The last path segment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Handle to a document database.
///
/// Constructed once at startup and shared as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Reads one document outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError>;

    /// Lists every document directly inside `collection`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Value)>, StoreError>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Cheap liveness probe used by the health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the backend is unreachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// An open read-then-write transaction.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait Transaction: Send + fmt::Debug {
    /// Reads one document and adds it to the read set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or contention.
    async fn get(&mut self, path: &DocumentPath) -> Result<Option<Value>, StoreError>;

    /// Lists a collection and adds every listed document to the read set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or contention.
    async fn list(
        &mut self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    /// Creates or updates a document.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or contention.
    async fn set(&mut self, path: &DocumentPath, value: Value, mode: SetMode)
    -> Result<(), StoreError>;

    /// Deletes a document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or contention.
    async fn delete(&mut self, path: &DocumentPath) -> Result<(), StoreError>;

    /// Applies every write atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Aborted`] if a document in the read set changed
    /// since it was read; nothing is applied in that case.
    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// Merges `patch` into `target` the way a merge-upsert does.
///
/// Objects merge key by key, recursively. Any other value in `patch`
/// (including `null`) replaces the target value.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                let nested = value.is_object() && dst.get(&key).is_some_and(Value::is_object);
                match dst.get_mut(&key) {
                    Some(existing) if nested => merge_json(existing, value),
                    _ => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Replaces each top-level field of `target` named in `patch`.
///
/// Nested objects are not merged: a field's new value is stored as given.
pub fn update_fields(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(dst), Value::Object(src)) => dst.extend(src),
        (dst, src) => *dst = src,
    }
}

/// Applies `patch` to `existing` according to `mode`.
#[must_use]
pub fn apply_set(existing: Option<Value>, patch: Value, mode: SetMode) -> Value {
    match (mode, existing) {
        (SetMode::Merge, Some(mut current)) => {
            merge_json(&mut current, patch);
            current
        }
        (SetMode::Update, Some(mut current)) => {
            update_fields(&mut current, patch);
            current
        }
        (_, _) => patch,
    }
}
