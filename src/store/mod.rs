//! Storage layer: the document store contract, its backends, and the
//! versioned layout store built on top of it.

pub mod document;
pub mod layout_store;
pub mod memory;
pub mod postgres;

pub use document::{CollectionPath, DocumentPath, DocumentStore, SetMode, StoreError, Transaction};
pub use layout_store::LayoutStore;
pub use memory::MemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
