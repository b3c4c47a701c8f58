//! Data Transfer Objects for REST request/response serialization.
//!
//! The client floor-plan shape lives in [`crate::domain::floor_plan`]; the
//! types here cover the versioned request and the polling response.

pub mod layout_dto;

pub use layout_dto::*;
