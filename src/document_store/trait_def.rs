//! DocumentStore trait definition.

use super::models::{Document, DocumentWrite, OrderBy};
use thiserror::Error;

/// Errors raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("Store connection lock poisoned")]
    LockPoisoned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for document storage backends.
///
/// Every write method is all-or-nothing: either every field write (sentinels
/// included) of every document is applied, or none is.
pub trait DocumentStore: Send + Sync {
    /// Get a document by id. A missing document is `Ok(None)`, not an error.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// List every document of a collection, optionally ordered by a field.
    /// Without an order, documents come back in insertion order.
    fn list(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>, StoreError>;

    /// Create a new document with a store-assigned id. Returns the id.
    fn add(&self, collection: &str, write: &DocumentWrite) -> Result<String, StoreError>;

    /// Apply `write` to an existing document. Fails with `NotFound` if the
    /// document does not exist.
    fn update(&self, collection: &str, id: &str, write: &DocumentWrite) -> Result<(), StoreError>;

    /// Apply several updates as one unit. If any document is missing or any
    /// write fails, no document is modified.
    fn batch_update(
        &self,
        collection: &str,
        updates: &[(String, DocumentWrite)],
    ) -> Result<(), StoreError>;
}
