//! Normalized layout model as persisted in the document store.
//!
//! One [`Layout`] per event: a metadata document (version, canvas, opaque
//! client snapshot, timestamps) plus one document per [`Element`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::ids::{ElementId, EventId};

/// Version written by the first successful save of a layout is this + 1.
pub const INITIAL_VERSION: u64 = 1;

/// A point of the room-boundary polygon, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

/// Optional room outline drawn under the elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomBoundary {
    /// Polygon vertices in drawing order.
    #[serde(default)]
    pub vertices: Vec<Point>,
    /// Whether the last vertex connects back to the first.
    #[serde(default)]
    pub closed: bool,
}

/// Canvas parameters stored in the metadata document.
///
/// Every field is optional on disk; readers fill defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Canvas {
    /// Canvas width in pixels.
    #[serde(default)]
    pub width: Option<f64>,
    /// Canvas height in pixels.
    #[serde(default)]
    pub height: Option<f64>,
    /// Pixels per meter.
    #[serde(default)]
    pub px_per_m: Option<f64>,
    /// Editor grid spacing in pixels.
    #[serde(default)]
    pub grid: Option<f64>,
    /// Editor zoom factor.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Room outline.
    #[serde(default, rename = "roomBoundary")]
    pub room_boundary: Option<RoomBoundary>,
    /// Client-side floor-plan identifier.
    #[serde(default)]
    pub floorplan_id: Option<String>,
}

/// Display metadata used only by the format translator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMeta {
    /// Identifier of the client palette entry the element was created from.
    #[serde(default)]
    pub config_id: Option<String>,
    /// Shape kind, e.g. `rounded-rect` or `circle`.
    #[serde(default)]
    pub shape: Option<String>,
    /// Palette label.
    #[serde(default)]
    pub label: Option<String>,
    /// Label text color.
    #[serde(default)]
    pub text_color: Option<String>,
    /// Palette default width.
    #[serde(default)]
    pub default_width: Option<u32>,
    /// Palette default height.
    #[serde(default)]
    pub default_height: Option<u32>,
    /// Palette default radius for round shapes.
    #[serde(default)]
    pub default_radius: Option<u32>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Position, size and styling of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Geometry {
    /// Left edge in canvas pixels.
    #[serde(default)]
    pub x: f64,
    /// Top edge in canvas pixels.
    #[serde(default)]
    pub y: f64,
    /// Width in pixels.
    #[serde(default = "default_element_width")]
    pub width: f64,
    /// Height in pixels.
    #[serde(default = "default_element_height")]
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Radius for round elements.
    #[serde(default)]
    pub radius: Option<f64>,
    /// Fill color.
    #[serde(default)]
    pub color: Option<String>,
    /// Display metadata.
    #[serde(default)]
    pub meta: DisplayMeta,
}

/// Default element width in pixels.
pub const DEFAULT_ELEMENT_WIDTH: f64 = 80.0;
/// Default element height in pixels.
pub const DEFAULT_ELEMENT_HEIGHT: f64 = 60.0;

fn default_element_width() -> f64 {
    DEFAULT_ELEMENT_WIDTH
}

fn default_element_height() -> f64 {
    DEFAULT_ELEMENT_HEIGHT
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: DEFAULT_ELEMENT_WIDTH,
            height: DEFAULT_ELEMENT_HEIGHT,
            rotation: 0.0,
            radius: None,
            color: None,
            meta: DisplayMeta::default(),
        }
    }
}

/// A placeable object (table, stage, ...) inside a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Element {
    /// Caller-chosen id, stable across saves.
    #[schema(value_type = String)]
    pub id: ElementId,
    /// Semantic category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display label.
    #[serde(default)]
    pub name: String,
    /// Seat count.
    #[serde(default)]
    pub capacity: u32,
    /// Geometry and display metadata.
    #[serde(default)]
    pub geom: Geometry,
    /// Guests seated here, in seat order.
    #[serde(default)]
    pub assigned_guest_ids: Vec<String>,
}

/// Fully assembled layout as returned by a store read.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Owning event.
    pub event_id: EventId,
    /// Current version.
    pub version: u64,
    /// Canvas parameters.
    pub canvas: Canvas,
    /// Opaque client rendering snapshot.
    pub konva_snapshot: Option<Value>,
    /// All elements, ordered by id.
    pub elements: Vec<Element>,
    /// First write time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last write time.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Whether a layout exists yet, and at which version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    /// No metadata document has been written.
    Uninitialized,
    /// Stored at the given version.
    Versioned(u64),
}

impl LayoutState {
    /// The version a writer must claim as its base.
    ///
    /// An uninitialized layout behaves as if stored at
    /// [`INITIAL_VERSION`].
    #[must_use]
    pub const fn version(self) -> u64 {
        match self {
            Self::Uninitialized => INITIAL_VERSION,
            Self::Versioned(v) => v,
        }
    }

    /// Returns `true` if a write based on `base_version` may proceed.
    #[must_use]
    pub const fn accepts(self, base_version: u64) -> bool {
        self.version() == base_version
    }
}

/// Input of a versioned layout write.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWrite {
    /// Version the writer based its edit on.
    pub base_version: u64,
    /// New canvas parameters.
    pub canvas: Canvas,
    /// New client snapshot.
    pub konva_snapshot: Option<Value>,
    /// Complete new element set.
    pub elements: Vec<Element>,
}

/// Result of a versioned layout write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Committed; the layout is now at `new_version`.
    Accepted {
        /// Version after the write.
        new_version: u64,
    },
    /// Rejected because the base version was stale. Nothing was written.
    Conflict {
        /// Authoritative stored version.
        current_version: u64,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uninitialized_layout_accepts_only_initial_version() {
        assert!(LayoutState::Uninitialized.accepts(INITIAL_VERSION));
        assert!(!LayoutState::Uninitialized.accepts(2));
        assert_eq!(LayoutState::Uninitialized.version(), 1);
    }

    #[test]
    fn versioned_layout_accepts_exact_match() {
        let state = LayoutState::Versioned(3);
        assert!(state.accepts(3));
        assert!(!state.accepts(2));
        assert!(!state.accepts(4));
    }

    #[test]
    fn element_fills_legacy_geometry_defaults() {
        let raw = json!({
            "id": "t1",
            "type": "table",
            "name": "T1",
            "capacity": 8,
            "geom": { "x": 10, "y": 20 }
        });
        let Ok(element) = serde_json::from_value::<Element>(raw) else {
            panic!("element should parse");
        };
        assert_eq!(element.geom.width, DEFAULT_ELEMENT_WIDTH);
        assert_eq!(element.geom.height, DEFAULT_ELEMENT_HEIGHT);
        assert_eq!(element.geom.rotation, 0.0);
        assert!(element.assigned_guest_ids.is_empty());
        assert_eq!(element.geom.meta, DisplayMeta::default());
    }

    #[test]
    fn optional_fields_serialize_as_null() {
        let Ok(value) = serde_json::to_value(Geometry::default()) else {
            panic!("geometry should serialize");
        };
        assert_eq!(value.get("radius"), Some(&Value::Null));
        assert_eq!(
            value.pointer("/meta/textColor"),
            Some(&Value::Null)
        );
    }
}
