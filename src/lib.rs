//! Cultivar Catalog Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod audit;
pub mod config;
pub mod cultivar;
pub mod document_store;
pub mod identity;
pub mod review_generator;
pub mod server;
pub mod sqlite_persistence;
pub mod storage;

// Re-export commonly used types for convenience
pub use cultivar::{CatalogError, CultivarManager};
pub use document_store::{DocumentStore, SqliteDocumentStore};
pub use identity::{IdentityProvider, StaticTokenIdentityProvider, UserIdentity};
pub use review_generator::ReviewGenerator;
pub use server::{run_server, RequestsLoggingLevel};
pub use storage::{LocalObjectStorage, ObjectStorage};
