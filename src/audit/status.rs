//! Single and bulk status transitions.
//!
//! Any status may move to any other, including to itself. Each transition
//! writes the status, the `updatedAt` sentinel and one history entry per
//! document.

use super::history::{append_history, build_status_entry, Actor};
use crate::cultivar::{CultivarStatus, HistoryEntry};
use crate::document_store::{Document, DocumentStore, DocumentWrite, StoreError};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Status of a raw record. Absent or unknown reads as the default status.
pub fn current_status(data: &Map<String, Value>) -> CultivarStatus {
    data.get("status")
        .and_then(Value::as_str)
        .and_then(CultivarStatus::parse)
        .unwrap_or_default()
}

/// The write moving `document` to `new_status`, and the entry it appends.
pub fn plan_transition(
    document: &Document,
    new_status: CultivarStatus,
    bulk: bool,
    actor: &Actor,
) -> Result<(DocumentWrite, HistoryEntry), StoreError> {
    let old_status = current_status(&document.data);
    let entry = build_status_entry(old_status.as_str(), new_status.as_str(), bulk, actor);
    let write = DocumentWrite::new().set("status", json!(new_status.as_str()));
    let write = append_history(write, &entry)?;
    Ok((write, entry))
}

/// Move one document to `new_status`.
pub fn set_status(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    new_status: CultivarStatus,
    actor: &Actor,
) -> Result<HistoryEntry, StoreError> {
    let document = store
        .get(collection, id)?
        .ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
    let (write, entry) = plan_transition(&document, new_status, false, actor)?;
    store.update(collection, id, &write)?;
    Ok(entry)
}

/// Ids in first-seen order, duplicates dropped.
pub fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Move every document in `ids` to `new_status` in one atomic batch.
///
/// An empty `ids` is a no-op. A missing id fails the whole batch before
/// anything is written.
pub fn set_status_bulk(
    store: &dyn DocumentStore,
    collection: &str,
    ids: &[String],
    new_status: CultivarStatus,
    actor: &Actor,
) -> Result<Vec<(String, HistoryEntry)>, StoreError> {
    let ids = dedup_ids(ids);
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut updates = Vec::with_capacity(ids.len());
    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        let document = store
            .get(collection, &id)?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            })?;
        let (write, entry) = plan_transition(&document, new_status, true, actor)?;
        updates.push((id.clone(), write));
        entries.push((id, entry));
    }

    store.batch_update(collection, &updates)?;
    Ok(entries)
}
