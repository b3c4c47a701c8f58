//! Service layer: business logic orchestration.
//!
//! [`LayoutService`] checks access through [`LayoutAccess`], then reads or
//! writes layouts through the [`crate::store::LayoutStore`].

pub mod access;
pub mod layout_service;

pub use access::{AccessDecision, DenyReason, LayoutAccess};
pub use layout_service::{LayoutMeta, LayoutService};
