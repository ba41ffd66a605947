//! Document store collaborator.
//!
//! Entities are persisted as schemaless JSON documents grouped in collections.
//! Writes are expressed as [`DocumentWrite`]s, which may carry sentinels
//! (server timestamp, array append) resolved by the store inside the same
//! transaction that applies the plain field values.

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::DOCUMENT_VERSIONED_SCHEMAS;
pub use store::SqliteDocumentStore;
pub use trait_def::{DocumentStore, StoreError};
