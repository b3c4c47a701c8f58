//! Who may read or write an event's layout.
//!
//! Access is derived from the event record (`events/{event_id}`), owned by
//! the event-management side of the product: administrators always pass,
//! otherwise the caller must be the recorded owner (`createdBy`) or listed
//! in `collaborators`.

use std::sync::Arc;

use serde_json::Value;

use crate::api::auth::AuthUser;
use crate::domain::EventId;
use crate::store::{CollectionPath, DocumentStore, StoreError};

/// Why access was denied. Logged only, never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No event record exists.
    EventNotFound,
    /// The caller neither owns nor collaborates on the event.
    NotOwnerOrCollaborator,
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The caller may proceed.
    Granted,
    /// The caller may not proceed.
    Denied(DenyReason),
}

/// The fields of an event record that matter for access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EventAccess {
    owner: Option<String>,
    collaborators: Vec<String>,
}

/// Renders a string or numeric id as a trimmed string.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl EventAccess {
    fn from_document(doc: &Value) -> Self {
        Self {
            owner: doc.get("createdBy").and_then(id_text),
            collaborators: doc
                .get("collaborators")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(id_text).collect())
                .unwrap_or_default(),
        }
    }

    fn admits(&self, user_id: &str) -> bool {
        self.owner.as_deref() == Some(user_id) || self.collaborators.iter().any(|c| c == user_id)
    }
}

/// Access controller for layout operations.
#[derive(Debug, Clone)]
pub struct LayoutAccess {
    store: Arc<dyn DocumentStore>,
}

impl LayoutAccess {
    /// Creates a controller that reads event records from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Decides whether `user` may access the layout of `event_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub async fn authorize(
        &self,
        user: &AuthUser,
        event_id: &EventId,
    ) -> Result<AccessDecision, StoreError> {
        let path = CollectionPath::root("events").doc(event_id.as_str());
        let Some(doc) = self.store.get(&path).await? else {
            return Ok(AccessDecision::Denied(DenyReason::EventNotFound));
        };
        if user.is_admin() {
            return Ok(AccessDecision::Granted);
        }
        if EventAccess::from_document(&doc).admits(user.user_id.trim()) {
            Ok(AccessDecision::Granted)
        } else {
            Ok(AccessDecision::Denied(DenyReason::NotOwnerOrCollaborator))
        }
    }
}
