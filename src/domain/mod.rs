//! Domain layer: identifiers, the stored layout model, the client
//! floor-plan shape, and the translator between the two.

pub mod floor_plan;
pub mod ids;
pub mod layout;
pub mod translate;

pub use floor_plan::{CanvasSize, ElementConfig, FloorPlan, FloorPlanElement};
pub use ids::{ElementId, EventId, IdError};
pub use layout::{
    Canvas, DisplayMeta, Element, Geometry, Layout, LayoutState, LayoutWrite, RoomBoundary,
    WriteOutcome,
};
