//! # floorplan-gateway
//!
//! REST backend for event floor-plan layouts.
//!
//! Each event owns one layout: canvas parameters, an opaque client
//! snapshot, and a set of placeable elements (tables, stages, ...). Every
//! accepted save bumps the layout's version by exactly one; a save based on
//! a stale version is rejected with the authoritative version so the
//! client can re-fetch. Layouts are stored in a document database through
//! the [`store::DocumentStore`] trait.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, X-User-Id / X-User-Role from the auth proxy)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── LayoutService + LayoutAccess (service/)
//!     ├── Format translator (domain/)
//!     │
//!     ├── LayoutStore (store/)
//!     │
//!     └── DocumentStore: in-memory | PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
