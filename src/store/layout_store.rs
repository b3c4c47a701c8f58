//! Versioned layout persistence with optimistic concurrency control.
//!
//! Storage layout per event:
//!
//! ```text
//! events/{event_id}/layout/meta                 version, canvas, konva_snapshot, timestamps
//! events/{event_id}/layout/meta/elements/{id}   type, name, capacity, geom, assigned_guest_ids
//! ```
//!
//! A write is accepted only if the caller's base version equals the stored
//! one. The version bump, element upserts and element deletes commit in a
//! single transaction or not at all.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{CollectionPath, DocumentPath, DocumentStore, SetMode, StoreError};
use crate::domain::layout::{
    Canvas, Element, Geometry, INITIAL_VERSION, Layout, LayoutState, LayoutWrite, WriteOutcome,
};
use crate::domain::{ElementId, EventId};

/// Default number of times a contended transaction is re-run.
pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 5;

/// Metadata document as stored.
#[derive(Debug, Deserialize)]
struct MetaDocument {
    #[serde(default = "initial_version")]
    version: u64,
    #[serde(default)]
    canvas: Canvas,
    #[serde(default)]
    konva_snapshot: Option<Value>,
    #[serde(default, rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt")]
    updated_at: Option<DateTime<Utc>>,
}

const fn initial_version() -> u64 {
    INITIAL_VERSION
}

/// Fields replaced whole in the metadata document on every accepted write.
#[derive(Debug, Serialize)]
struct MetaUpdate<'a> {
    version: u64,
    canvas: &'a Canvas,
    konva_snapshot: &'a Option<Value>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

/// Element document as stored (the id is the document id).
#[derive(Debug, Deserialize)]
struct ElementDocument {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    capacity: u32,
    #[serde(default)]
    geom: Geometry,
    #[serde(default)]
    assigned_guest_ids: Vec<String>,
}

/// Element fields merged on upsert.
#[derive(Debug, Serialize)]
struct ElementUpdate<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    capacity: u32,
    geom: &'a Geometry,
    assigned_guest_ids: &'a [String],
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
}

fn meta_path(event_id: &EventId) -> DocumentPath {
    CollectionPath::root("events")
        .doc(event_id.as_str())
        .collection("layout")
        .doc("meta")
}

fn elements_path(event_id: &EventId) -> CollectionPath {
    meta_path(event_id).collection("elements")
}

fn decode<T: DeserializeOwned>(path: &DocumentPath, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(path: &DocumentPath, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn state_of(meta: Option<&MetaDocument>) -> LayoutState {
    meta.map_or(LayoutState::Uninitialized, |m| {
        LayoutState::Versioned(m.version)
    })
}

/// Reads and writes layouts through an injected [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct LayoutStore {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl LayoutStore {
    /// Creates a layout store on top of `store`.
    ///
    /// `max_attempts` bounds how often a transaction aborted by contention
    /// is re-run (at least once).
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// The underlying document store.
    #[must_use]
    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Reads only the metadata document and reports the layout state.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or a corrupt document.
    pub async fn state(&self, event_id: &EventId) -> Result<LayoutState, StoreError> {
        let path = meta_path(event_id);
        let meta = match self.store.get(&path).await? {
            Some(raw) => Some(decode::<MetaDocument>(&path, raw)?),
            None => None,
        };
        Ok(state_of(meta.as_ref()))
    }

    /// Reads the full layout, or `None` if it was never written.
    ///
    /// The element scan runs outside any transaction; it reflects a recent
    /// state, not necessarily the exact version in the metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or a corrupt document.
    pub async fn read(&self, event_id: &EventId) -> Result<Option<Layout>, StoreError> {
        let path = meta_path(event_id);
        let Some(raw) = self.store.get(&path).await? else {
            return Ok(None);
        };
        let meta: MetaDocument = decode(&path, raw)?;

        let collection = elements_path(event_id);
        let mut elements = Vec::new();
        for (id, raw) in self.store.list(&collection).await? {
            let doc_path = collection.doc(&id);
            let doc: ElementDocument = decode(&doc_path, raw)?;
            let id = ElementId::parse(&id).map_err(|e| StoreError::Corrupt {
                path: doc_path.to_string(),
                reason: e.to_string(),
            })?;
            elements.push(Element {
                id,
                kind: doc.kind,
                name: doc.name.unwrap_or_default(),
                capacity: doc.capacity,
                geom: doc.geom,
                assigned_guest_ids: doc.assigned_guest_ids,
            });
        }

        Ok(Some(Layout {
            event_id: event_id.clone(),
            version: meta.version,
            canvas: meta.canvas,
            konva_snapshot: meta.konva_snapshot,
            elements,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }))
    }

    /// Writes a new layout version if `write.base_version` is current.
    ///
    /// Elements present before the write but missing from `write.elements`
    /// are deleted; the rest are merge-upserted by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Contention`] if the transaction kept aborting,
    /// or another [`StoreError`] on backend failure. A stale base version
    /// is not an error but [`WriteOutcome::Conflict`].
    pub async fn write(
        &self,
        event_id: &EventId,
        write: &LayoutWrite,
    ) -> Result<WriteOutcome, StoreError> {
        for attempt in 1..=self.max_attempts {
            match self.try_write(event_id, write).await {
                Err(StoreError::Aborted) => {
                    tracing::debug!(%event_id, attempt, "layout transaction aborted, re-running");
                }
                other => return other,
            }
        }
        Err(StoreError::Contention {
            attempts: self.max_attempts,
        })
    }

    async fn try_write(
        &self,
        event_id: &EventId,
        write: &LayoutWrite,
    ) -> Result<WriteOutcome, StoreError> {
        let meta_path = meta_path(event_id);
        let collection = elements_path(event_id);

        let mut tx = self.store.begin().await?;

        let meta = match tx.get(&meta_path).await? {
            Some(raw) => Some(decode::<MetaDocument>(&meta_path, raw)?),
            None => None,
        };
        let state = state_of(meta.as_ref());
        if !state.accepts(write.base_version) {
            return Ok(WriteOutcome::Conflict {
                current_version: state.version(),
            });
        }

        // Listing inside the transaction puts every existing element in the
        // read set, so the delete set cannot go stale before commit.
        let existing: BTreeSet<String> = tx
            .list(&collection)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let now = Utc::now();
        let new_version = state.version() + 1;
        let update = MetaUpdate {
            version: new_version,
            canvas: &write.canvas,
            konva_snapshot: &write.konva_snapshot,
            updated_at: now,
            created_at: match state {
                LayoutState::Uninitialized => Some(now),
                LayoutState::Versioned(_) => None,
            },
        };
        tx.set(&meta_path, encode(&meta_path, &update)?, SetMode::Update)
            .await?;

        let mut incoming = BTreeSet::new();
        for element in &write.elements {
            incoming.insert(element.id.as_str());
            let doc = ElementUpdate {
                kind: &element.kind,
                name: &element.name,
                capacity: element.capacity,
                geom: &element.geom,
                assigned_guest_ids: &element.assigned_guest_ids,
                updated_at: now,
            };
            let path = collection.doc(element.id.as_str());
            tx.set(&path, encode(&path, &doc)?, SetMode::Merge).await?;
        }

        let removed: Vec<&String> = existing
            .iter()
            .filter(|id| !incoming.contains(id.as_str()))
            .collect();
        for id in &removed {
            tx.delete(&collection.doc(id)).await?;
        }

        tx.commit().await?;

        tracing::info!(
            %event_id,
            version = new_version,
            upserted = write.elements.len(),
            deleted = removed.len(),
            "layout written"
        );
        Ok(WriteOutcome::Accepted { new_version })
    }
}
