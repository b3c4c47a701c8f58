//! Client-facing floor-plan shape.
//!
//! This is what the seating editor renders: absolute pixel coordinates and
//! a per-element display config. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::ids::{ElementId, EventId};
use super::layout::RoomBoundary;

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CanvasSize {
    /// Width in pixels.
    #[serde(default = "default_canvas_width")]
    pub width: f64,
    /// Height in pixels.
    #[serde(default = "default_canvas_height")]
    pub height: f64,
}

/// Default canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: f64 = 1200.0;
/// Default canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;
/// Default scale in pixels per meter.
pub const DEFAULT_PX_PER_M: f64 = 50.0;

fn default_canvas_width() -> f64 {
    DEFAULT_CANVAS_WIDTH
}

fn default_canvas_height() -> f64 {
    DEFAULT_CANVAS_HEIGHT
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

/// Palette entry an element was created from, plus its styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElementConfig {
    /// Palette entry id.
    pub id: String,
    /// Shape kind.
    pub shape: String,
    /// Always `{}` in responses; the client picks icons itself.
    #[serde(default, skip_deserializing)]
    #[schema(value_type = Object)]
    pub icon: Map<String, Value>,
    /// Palette label.
    pub label: String,
    /// Fill color.
    pub color: String,
    /// Label text color.
    pub text_color: String,
    /// Palette default width.
    pub default_width: u32,
    /// Palette default height.
    pub default_height: u32,
    /// Palette default radius.
    #[serde(default)]
    pub default_radius: Option<u32>,
    /// Free-form description.
    pub description: String,
}

/// One element as the editor sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlanElement {
    /// Stable element id.
    #[schema(value_type = String)]
    pub id: ElementId,
    /// Semantic category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Radius for round elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Seat count.
    pub capacity: u32,
    /// Display label.
    pub name: String,
    /// Guests seated here.
    pub assigned_guests: Vec<String>,
    /// Display config.
    pub config: ElementConfig,
}

/// Complete floor plan for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlan {
    /// Floor-plan id; `fp-{eventId}` unless the client chose one.
    #[serde(default)]
    pub id: String,
    /// Owning event.
    #[schema(value_type = String)]
    pub event_id: EventId,
    /// Canvas dimensions.
    pub canvas_size: CanvasSize,
    /// Scale.
    #[serde(default = "default_px_per_m")]
    pub pixels_per_meter: f64,
    /// All elements.
    pub elements: Vec<FloorPlanElement>,
    /// Room outline.
    #[serde(default)]
    pub room_boundary: Option<RoomBoundary>,
    /// ISO-8601 creation time, empty when unknown.
    #[serde(default)]
    pub created_at: String,
    /// ISO-8601 last-update time, empty when unknown.
    #[serde(default)]
    pub updated_at: String,
}

fn default_px_per_m() -> f64 {
    DEFAULT_PX_PER_M
}
