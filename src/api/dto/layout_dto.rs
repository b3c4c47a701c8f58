//! Layout request/response DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{Canvas, Element, EventId, LayoutWrite};
use crate::service::LayoutMeta;

/// Keys whose joint presence marks a save body as a client floor plan.
pub const CLIENT_SHAPE_KEYS: [&str; 3] = ["eventId", "canvasSize", "elements"];

/// Returns `true` if `body` is a client floor plan rather than a legacy
/// versioned write.
#[must_use]
pub fn is_client_shape(body: &Value) -> bool {
    body.as_object()
        .is_some_and(|obj| CLIENT_SHAPE_KEYS.iter().all(|k| obj.contains_key(*k)))
}

/// Request body for `POST /layouts/save/` in the versioned (legacy) shape.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LegacyLayoutRequest {
    /// Event the layout belongs to.
    #[schema(value_type = String)]
    pub event_id: EventId,
    /// Version the edit was based on.
    pub version: u64,
    /// Canvas parameters.
    pub canvas: Canvas,
    /// Complete element set.
    pub elements: Vec<Element>,
    /// Opaque client snapshot, stored verbatim.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub konva_snapshot: Option<Value>,
}

impl LegacyLayoutRequest {
    /// Splits the request into its event id and the store write.
    #[must_use]
    pub fn into_write(self) -> (EventId, LayoutWrite) {
        (
            self.event_id,
            LayoutWrite {
                base_version: self.version,
                canvas: self.canvas,
                konva_snapshot: self.konva_snapshot,
                elements: self.elements,
            },
        )
    }
}

/// Response body for `GET /layouts/meta/{event_id}/`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetaResponse {
    /// Event the layout belongs to.
    pub event_id: String,
    /// Stored version, 1 if never written.
    pub version: u64,
    /// Last write time (ISO-8601), `null` if never written.
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
    /// Whether the layout holds any element.
    pub has_elements: bool,
}

impl MetaResponse {
    /// Builds the response for `event_id` from service output.
    #[must_use]
    pub fn new(event_id: &EventId, meta: &LayoutMeta) -> Self {
        Self {
            event_id: event_id.to_string(),
            version: meta.version,
            updated_at: meta
                .updated_at
                .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)),
            has_elements: meta.has_elements,
        }
    }
}
