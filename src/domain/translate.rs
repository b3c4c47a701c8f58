//! Bidirectional mapping between the stored layout and the client shape.
//!
//! Pure functions, no I/O. Display fields missing from storage are filled
//! with palette defaults on the way out; on the way in every client field
//! is written back, so a value never disappears once it has been set.

use chrono::{DateTime, SecondsFormat, Utc};

use super::floor_plan::{
    CanvasSize, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_PX_PER_M, ElementConfig,
    FloorPlan, FloorPlanElement,
};
use super::ids::EventId;
use super::layout::{Canvas, DisplayMeta, Element, Geometry, Layout, LayoutWrite};

/// Fill color when none is stored.
pub const DEFAULT_COLOR: &str = "#8B5CF6";
/// Label color when none is stored.
pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";
/// Shape when none is stored.
pub const DEFAULT_SHAPE: &str = "rounded-rect";
/// Grid spacing written for client saves.
pub const DEFAULT_GRID: f64 = 20.0;
/// Zoom factor written for client saves.
pub const DEFAULT_SCALE: f64 = 1.0;

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_pixels(value: f64) -> u32 {
    value.max(0.0).round() as u32
}

fn element_to_client(element: &Element) -> FloorPlanElement {
    let geom = &element.geom;
    let meta = &geom.meta;
    FloorPlanElement {
        id: element.id.clone(),
        kind: element.kind.clone(),
        x: geom.x,
        y: geom.y,
        width: geom.width,
        height: geom.height,
        rotation: geom.rotation,
        radius: geom.radius,
        capacity: element.capacity,
        name: element.name.clone(),
        assigned_guests: element.assigned_guest_ids.clone(),
        config: ElementConfig {
            id: meta
                .config_id
                .clone()
                .unwrap_or_else(|| element.kind.clone()),
            shape: meta
                .shape
                .clone()
                .unwrap_or_else(|| DEFAULT_SHAPE.to_string()),
            icon: serde_json::Map::new(),
            label: meta.label.clone().unwrap_or_else(|| element.kind.clone()),
            color: geom
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            text_color: meta
                .text_color
                .clone()
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            default_width: meta
                .default_width
                .unwrap_or_else(|| whole_pixels(geom.width)),
            default_height: meta
                .default_height
                .unwrap_or_else(|| whole_pixels(geom.height)),
            default_radius: meta.default_radius,
            description: meta.description.clone().unwrap_or_default(),
        },
    }
}

fn element_to_store(element: &FloorPlanElement) -> Element {
    let config = &element.config;
    Element {
        id: element.id.clone(),
        kind: element.kind.clone(),
        name: element.name.clone(),
        capacity: element.capacity,
        geom: Geometry {
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
            rotation: element.rotation,
            radius: element.radius,
            color: Some(config.color.clone()),
            meta: DisplayMeta {
                config_id: Some(config.id.clone()),
                shape: Some(config.shape.clone()),
                label: Some(config.label.clone()),
                text_color: Some(config.text_color.clone()),
                default_width: Some(config.default_width),
                default_height: Some(config.default_height),
                default_radius: config.default_radius,
                description: Some(config.description.clone()),
            },
        },
        assigned_guest_ids: element.assigned_guests.clone(),
    }
}

/// Renders a stored layout (or its absence) as a client floor plan.
///
/// A missing layout yields an empty plan on the default canvas, never an
/// error.
#[must_use]
pub fn to_client_shape(event_id: &EventId, layout: Option<&Layout>) -> FloorPlan {
    let default_canvas = Canvas::default();
    let canvas = layout.map_or(&default_canvas, |l| &l.canvas);

    let id = canvas
        .floorplan_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("fp-{event_id}"));

    FloorPlan {
        id,
        event_id: event_id.clone(),
        canvas_size: CanvasSize {
            width: canvas.width.unwrap_or(DEFAULT_CANVAS_WIDTH),
            height: canvas.height.unwrap_or(DEFAULT_CANVAS_HEIGHT),
        },
        pixels_per_meter: canvas.px_per_m.unwrap_or(DEFAULT_PX_PER_M),
        elements: layout
            .map(|l| l.elements.iter().map(element_to_client).collect())
            .unwrap_or_default(),
        room_boundary: canvas.room_boundary.clone(),
        created_at: timestamp(layout.and_then(|l| l.created_at)),
        updated_at: timestamp(layout.and_then(|l| l.updated_at)),
    }
}

/// Converts a client floor plan into a versioned write based on
/// `base_version`.
#[must_use]
pub fn to_store_payload(plan: &FloorPlan, base_version: u64) -> LayoutWrite {
    LayoutWrite {
        base_version,
        canvas: Canvas {
            width: Some(plan.canvas_size.width),
            height: Some(plan.canvas_size.height),
            px_per_m: Some(plan.pixels_per_meter),
            grid: Some(DEFAULT_GRID),
            scale: Some(DEFAULT_SCALE),
            room_boundary: plan.room_boundary.clone(),
            floorplan_id: Some(plan.id.clone()).filter(|id| !id.is_empty()),
        },
        konva_snapshot: None,
        elements: plan.elements.iter().map(element_to_store).collect(),
    }
}
