//! SQLite-backed document store.
//!
//! Every write goes through a single connection guarded by a mutex and runs
//! inside a transaction, so a `DocumentWrite` (sentinels included) is applied
//! entirely or not at all.

use super::models::{Document, DocumentWrite, OrderBy, StoreTimestamp};
use super::schema::DOCUMENT_VERSIONED_SCHEMAS;
use super::trait_def::{DocumentStore, StoreError};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Open (or create) the document database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open document database at {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrate_if_needed(&mut conn, DOCUMENT_VERSIONED_SCHEMAS)?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        info!(
            "Opened document store at {:?} with {} documents",
            db_path, document_count
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A store living only in memory, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate_if_needed(&mut conn, DOCUMENT_VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn parse_data(id: &str, text: &str) -> Result<Map<String, Value>, StoreError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::InvalidDocument {
                id: id.to_string(),
                reason: format!("expected a JSON object, found {}", json_type_name(&other)),
            }),
        }
    }

    fn read_document(
        conn: &Connection,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let text: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |r| r.get(0),
            )
            .optional()?;
        match text {
            Some(text) => Ok(Some(Document {
                id: id.to_string(),
                data: Self::parse_data(id, &text)?,
            })),
            None => Ok(None),
        }
    }

    fn write_document(conn: &Connection, collection: &str, document: &Document) -> Result<(), StoreError> {
        let text = serde_json::to_string(&document.data)?;
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
            params![collection, document.id, text],
        )?;
        Ok(())
    }

    /// Read, mutate and write back one document on an open transaction.
    fn update_in(
        conn: &Connection,
        collection: &str,
        id: &str,
        write: &DocumentWrite,
        now: StoreTimestamp,
    ) -> Result<(), StoreError> {
        let mut document =
            Self::read_document(conn, collection, id)?.ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        write.apply(&mut document.data, now);
        Self::write_document(conn, collection, &document)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        Self::read_document(&conn, collection, id)
    }

    fn list(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY rowid")?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut documents = Vec::with_capacity(rows.len());
        for (id, text) in rows {
            match Self::parse_data(&id, &text) {
                Ok(data) => documents.push(Document { id, data }),
                Err(e) => warn!("Skipping unreadable document {}/{}: {}", collection, id, e),
            }
        }

        if let Some(order) = order {
            order.sort(&mut documents);
        }
        Ok(documents)
    }

    fn add(&self, collection: &str, write: &DocumentWrite) -> Result<String, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut document = Document {
            id: Uuid::new_v4().to_string(),
            data: Map::new(),
        };
        write.apply(&mut document.data, StoreTimestamp::now());
        Self::write_document(&tx, collection, &document)?;

        tx.commit()?;
        Ok(document.id)
    }

    fn update(&self, collection: &str, id: &str, write: &DocumentWrite) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::update_in(&tx, collection, id, write, StoreTimestamp::now())?;
        tx.commit()?;
        Ok(())
    }

    fn batch_update(
        &self,
        collection: &str,
        updates: &[(String, DocumentWrite)],
    ) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = StoreTimestamp::now();
        for (id, write) in updates {
            // An early return drops `tx`, which rolls back every update applied so far.
            Self::update_in(&tx, collection, id, write, now)?;
        }
        tx.commit()?;
        Ok(())
    }
}
