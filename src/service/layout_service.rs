//! Layout service: access checks, versioned saves and reads.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use super::access::{AccessDecision, DenyReason, LayoutAccess};
use crate::api::auth::AuthUser;
use crate::domain::layout::INITIAL_VERSION;
use crate::domain::translate::{to_client_shape, to_store_payload};
use crate::domain::{ElementId, EventId, FloorPlan, LayoutWrite, WriteOutcome};
use crate::error::GatewayError;
use crate::store::LayoutStore;

/// Lightweight view of a layout used for polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutMeta {
    /// Stored version, [`INITIAL_VERSION`] if never written.
    pub version: u64,
    /// Last write time, `None` if never written.
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the layout holds at least one element.
    pub has_elements: bool,
}

/// Orchestration layer for layout operations.
///
/// Every operation checks access first. Saves go through
/// [`LayoutStore::write`]; a version conflict is retried once on the
/// authoritative version before it reaches the caller.
#[derive(Debug, Clone)]
pub struct LayoutService {
    layouts: LayoutStore,
    access: LayoutAccess,
}

impl LayoutService {
    /// Creates a service over `layouts`, sharing its document store for
    /// event records.
    #[must_use]
    pub fn new(layouts: LayoutStore) -> Self {
        let access = LayoutAccess::new(Arc::clone(layouts.documents()));
        Self { layouts, access }
    }

    /// Saves a client floor plan on top of whatever version is stored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] when access is denied,
    /// [`GatewayError::Validation`] on duplicate element ids, or
    /// [`GatewayError::VersionConflict`] if the save lost two races in a row.
    pub async fn save_floor_plan(
        &self,
        user: &AuthUser,
        plan: &FloorPlan,
    ) -> Result<FloorPlan, GatewayError> {
        let event_id = &plan.event_id;
        check_unique_ids(plan.elements.iter().map(|e| &e.id))?;
        self.require_access(user, event_id).await?;
        let base_version = self.layouts.state(event_id).await?.version();
        self.save(event_id, to_store_payload(plan, base_version)).await
    }

    /// Saves a legacy write based on the version the caller supplied.
    ///
    /// # Errors
    ///
    /// Same as [`Self::save_floor_plan`].
    pub async fn save_legacy(
        &self,
        user: &AuthUser,
        event_id: &EventId,
        write: LayoutWrite,
    ) -> Result<FloorPlan, GatewayError> {
        check_unique_ids(write.elements.iter().map(|e| &e.id))?;
        self.require_access(user, event_id).await?;
        self.save(event_id, write).await
    }

    /// Reads the layout in client shape; an unwritten layout is an empty
    /// plan stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] when access is denied, or a
    /// store error.
    pub async fn read(&self, user: &AuthUser, event_id: &EventId) -> Result<FloorPlan, GatewayError> {
        self.require_access(user, event_id).await?;
        let layout = self.layouts.read(event_id).await?;
        let mut plan = to_client_shape(event_id, layout.as_ref());
        if layout.is_none() {
            plan.updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        }
        Ok(plan)
    }

    /// Reads the layout's version and freshness.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown event,
    /// [`GatewayError::Forbidden`] when access is denied, or a store error.
    pub async fn meta(&self, user: &AuthUser, event_id: &EventId) -> Result<LayoutMeta, GatewayError> {
        match self.access.authorize(user, event_id).await? {
            AccessDecision::Granted => {}
            AccessDecision::Denied(DenyReason::EventNotFound) => {
                tracing::info!(%event_id, "layout meta for unknown event");
                return Err(GatewayError::EventNotFound(event_id.to_string()));
            }
            AccessDecision::Denied(reason) => {
                tracing::warn!(%event_id, user_id = %user.user_id, ?reason, "access denied");
                return Err(GatewayError::Forbidden);
            }
        }

        Ok(match self.layouts.read(event_id).await? {
            Some(layout) => LayoutMeta {
                version: layout.version,
                updated_at: layout.updated_at,
                has_elements: !layout.elements.is_empty(),
            },
            None => LayoutMeta {
                version: INITIAL_VERSION,
                updated_at: None,
                has_elements: false,
            },
        })
    }

    async fn require_access(&self, user: &AuthUser, event_id: &EventId) -> Result<(), GatewayError> {
        match self.access.authorize(user, event_id).await? {
            AccessDecision::Granted => Ok(()),
            AccessDecision::Denied(reason) => {
                tracing::warn!(%event_id, user_id = %user.user_id, ?reason, "access denied");
                Err(GatewayError::Forbidden)
            }
        }
    }

    async fn save(&self, event_id: &EventId, mut write: LayoutWrite) -> Result<FloorPlan, GatewayError> {
        let mut retried = false;
        loop {
            match self.layouts.write(event_id, &write).await? {
                WriteOutcome::Accepted { new_version } => {
                    tracing::info!(%event_id, version = new_version, "layout saved");
                    break;
                }
                WriteOutcome::Conflict { current_version } if !retried => {
                    tracing::info!(
                        %event_id,
                        base = write.base_version,
                        current_version,
                        "layout conflict, retrying on current version"
                    );
                    write.base_version = current_version;
                    retried = true;
                }
                WriteOutcome::Conflict { current_version } => {
                    tracing::warn!(%event_id, current_version, "layout conflict");
                    return Err(GatewayError::VersionConflict { current_version });
                }
            }
        }

        let layout = self.layouts.read(event_id).await?;
        Ok(to_client_shape(event_id, layout.as_ref()))
    }
}

fn check_unique_ids<'a>(ids: impl Iterator<Item = &'a ElementId>) -> Result<(), GatewayError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(GatewayError::Validation(format!("duplicate element id: {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::api::auth::Role;
    use crate::domain::{CanvasSize, ElementConfig, FloorPlanElement};
    use crate::store::{
        CollectionPath, DocumentPath, DocumentStore, MemoryDocumentStore, StoreError, Transaction,
    };

    fn event(raw: &str) -> EventId {
        let Ok(id) = EventId::parse(raw) else {
            panic!("valid id");
        };
        id
    }

    fn planner(id: &str) -> AuthUser {
        AuthUser {
            user_id: id.to_string(),
            role: Role::Planner,
        }
    }

    fn table(id: &str, x: f64) -> FloorPlanElement {
        let Ok(id) = ElementId::parse(id) else {
            panic!("valid id");
        };
        FloorPlanElement {
            id,
            kind: "table".to_string(),
            x,
            y: 40.0,
            width: 120.0,
            height: 120.0,
            rotation: 0.0,
            radius: Some(60.0),
            capacity: 8,
            name: "Table".to_string(),
            assigned_guests: Vec::new(),
            config: ElementConfig {
                id: "round-table".to_string(),
                shape: "circle".to_string(),
                icon: serde_json::Map::new(),
                label: "Round table".to_string(),
                color: "#8B5CF6".to_string(),
                text_color: "#FFFFFF".to_string(),
                default_width: 120,
                default_height: 120,
                default_radius: Some(60),
                description: String::new(),
            },
        }
    }

    fn plan(elements: Vec<FloorPlanElement>) -> FloorPlan {
        FloorPlan {
            id: String::new(),
            event_id: event("ev1"),
            canvas_size: CanvasSize::default(),
            pixels_per_meter: 50.0,
            elements,
            room_boundary: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    async fn seed_event(docs: &MemoryDocumentStore) {
        docs.put(
            &CollectionPath::root("events").doc("ev1"),
            json!({ "createdBy": "u1", "collaborators": [] }),
        )
        .await;
    }

    async fn service() -> LayoutService {
        let docs = MemoryDocumentStore::new();
        seed_event(&docs).await;
        LayoutService::new(LayoutStore::new(Arc::new(docs), 5))
    }

    /// Moves the stored version forward right before every transaction,
    /// so each write attempt loses the race.
    #[derive(Debug, Clone)]
    struct RacingStore {
        inner: MemoryDocumentStore,
        racing: Arc<AtomicBool>,
    }

    fn meta_path() -> DocumentPath {
        CollectionPath::root("events")
            .doc("ev1")
            .collection("layout")
            .doc("meta")
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
            self.inner.get(path).await
        }

        async fn list(
            &self,
            collection: &CollectionPath,
        ) -> Result<Vec<(String, Value)>, StoreError> {
            self.inner.list(collection).await
        }

        async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
            if self.racing.load(Ordering::SeqCst) {
                let current = self
                    .inner
                    .get(&meta_path())
                    .await?
                    .and_then(|m| m.get("version").and_then(Value::as_u64))
                    .unwrap_or(1);
                self.inner
                    .put(&meta_path(), json!({ "version": current + 1 }))
                    .await;
            }
            self.inner.begin().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "racing"
        }
    }

    #[tokio::test]
    async fn client_save_on_fresh_event_returns_version_two_plan() {
        let svc = service().await;
        let Ok(saved) = svc.save_floor_plan(&planner("u1"), &plan(vec![table("t1", 100.0)])).await
        else {
            panic!("save failed");
        };
        assert_eq!(saved.id, "fp-ev1");
        let Some(t1) = saved.elements.first() else {
            panic!("element missing");
        };
        assert_eq!((t1.x, t1.y, t1.width, t1.height), (100.0, 40.0, 120.0, 120.0));
        assert_eq!(t1.radius, Some(60.0));

        let Ok(meta) = svc.meta(&planner("u1"), &event("ev1")).await else {
            panic!("meta failed");
        };
        assert_eq!(meta.version, 2);
        assert!(meta.has_elements);
        assert!(meta.updated_at.is_some());
    }

    #[tokio::test]
    async fn client_saves_always_land_on_current_version() {
        let svc = service().await;
        for x in [1.0, 2.0, 3.0] {
            let result = svc.save_floor_plan(&planner("u1"), &plan(vec![table("t1", x)])).await;
            assert!(result.is_ok());
        }
        let Ok(meta) = svc.meta(&planner("u1"), &event("ev1")).await else {
            panic!("meta failed");
        };
        assert_eq!(meta.version, 4);
    }

    #[tokio::test]
    async fn stale_legacy_save_is_retried_once_on_current_version() {
        let svc = service().await;
        let user = planner("u1");
        let ev = event("ev1");
        let _ = svc.save_floor_plan(&user, &plan(vec![table("t1", 1.0)])).await;
        let _ = svc.save_floor_plan(&user, &plan(vec![table("t1", 2.0)])).await;

        let stale = to_store_payload(&plan(vec![table("t2", 5.0)]), 1);
        let Ok(saved) = svc.save_legacy(&user, &ev, stale).await else {
            panic!("retry did not recover");
        };
        let ids: Vec<&str> = saved.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t2"]);

        let Ok(meta) = svc.meta(&user, &ev).await else {
            panic!("meta failed");
        };
        assert_eq!(meta.version, 4);
    }

    #[tokio::test]
    async fn second_conflict_surfaces_current_version() {
        let docs = MemoryDocumentStore::new();
        seed_event(&docs).await;
        let racing = Arc::new(AtomicBool::new(true));
        let store = RacingStore {
            inner: docs,
            racing: Arc::clone(&racing),
        };
        let svc = LayoutService::new(LayoutStore::new(Arc::new(store), 5));

        let write = to_store_payload(&plan(vec![table("t1", 1.0)]), 1);
        let result = svc.save_legacy(&planner("u1"), &event("ev1"), write).await;
        assert!(matches!(
            result,
            Err(GatewayError::VersionConflict { current_version: 3 })
        ));
    }

    #[tokio::test]
    async fn duplicate_element_ids_are_rejected() {
        let svc = service().await;
        let result = svc
            .save_floor_plan(
                &planner("u1"),
                &plan(vec![table("t1", 1.0), table("t1", 2.0)]),
            )
            .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
        let Ok(meta) = svc.meta(&planner("u1"), &event("ev1")).await else {
            panic!("meta failed");
        };
        assert_eq!(meta.version, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_before_access_is_checked() {
        let svc = service().await;
        let stranger = planner("u2");
        let ev = event("missing");

        let mut p = plan(vec![table("t1", 1.0), table("t1", 2.0)]);
        p.event_id = ev.clone();
        let client = svc.save_floor_plan(&stranger, &p).await;
        assert!(matches!(client, Err(GatewayError::Validation(_))));

        let legacy = svc
            .save_legacy(&stranger, &ev, to_store_payload(&p, 1))
            .await;
        assert!(matches!(legacy, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn read_of_unwritten_layout_is_empty_plan() {
        let svc = service().await;
        let Ok(plan) = svc.read(&planner("u1"), &event("ev1")).await else {
            panic!("read failed");
        };
        assert!(plan.elements.is_empty());
        assert_eq!(plan.id, "fp-ev1");
        assert_eq!(plan.canvas_size, CanvasSize::default());
        assert!(plan.created_at.is_empty());
        assert!(!plan.updated_at.is_empty());
    }

    #[tokio::test]
    async fn meta_of_unwritten_layout_defaults() {
        let svc = service().await;
        let Ok(meta) = svc.meta(&planner("u1"), &event("ev1")).await else {
            panic!("meta failed");
        };
        assert_eq!(
            meta,
            LayoutMeta {
                version: 1,
                updated_at: None,
                has_elements: false,
            }
        );
    }

    #[tokio::test]
    async fn denials_are_uniform_on_save_and_read() {
        let svc = service().await;
        let stranger = planner("u2");

        for ev in ["ev1", "missing"] {
            let read = svc.read(&stranger, &event(ev)).await;
            assert!(matches!(read, Err(GatewayError::Forbidden)), "read {ev}");

            let mut p = plan(Vec::new());
            p.event_id = event(ev);
            let save = svc.save_floor_plan(&stranger, &p).await;
            assert!(matches!(save, Err(GatewayError::Forbidden)), "save {ev}");
        }
    }

    #[tokio::test]
    async fn meta_distinguishes_missing_event() {
        let svc = service().await;
        let missing = svc.meta(&planner("u1"), &event("missing")).await;
        assert!(matches!(missing, Err(GatewayError::EventNotFound(_))));

        let denied = svc.meta(&planner("u2"), &event("ev1")).await;
        assert!(matches!(denied, Err(GatewayError::Forbidden)));
    }
}
