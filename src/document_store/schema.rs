//! SQLite schema for the document store.
//!
//! Documents are stored as JSON text keyed by (collection, id). The implicit
//! rowid keeps insertion order for unordered listings.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const DOCUMENTS_TABLE: Table = Table {
    name: "documents",
    columns: &[
        sqlite_column!("collection", &SqlType::Text, non_null = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("data", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_documents_collection", "collection")],
    primary_key: &["collection", "id"],
};

pub const DOCUMENT_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[DOCUMENTS_TABLE],
    migration: None,
}];
