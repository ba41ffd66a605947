//! History entries and the write that appends them.
//!
//! Every committed cultivar mutation carries exactly one history entry. The
//! entry is appended with an array-append sentinel in the same
//! [`DocumentWrite`] as the field changes and the `updatedAt` server
//! timestamp, so the store applies all of it or none of it.
//!
//! The entry `timestamp` is the writer's wall clock while `updatedAt` is the
//! store's clock. The two may disagree under clock skew.

use super::diff::ChangeSet;
use crate::cultivar::timestamp::now_iso;
use crate::cultivar::HistoryEntry;
use crate::document_store::{DocumentWrite, StoreError};
use crate::identity::UserIdentity;
use serde_json::{json, Map, Value};

pub const EVENT_CREATED: &str = "Cultivar Created by Admin";
pub const EVENT_DETAILS_UPDATED: &str = "Cultivar Details Updated";
pub const EVENT_REVIEW_ADDED: &str = "Review Added";
pub const EVENT_IMAGE_ADDED: &str = "Image Added";
pub const EVENT_IMAGE_REMOVED: &str = "Image Removed";
pub const EVENT_INFO_ADDED: &str = "Additional Info Added";
pub const EVENT_INFO_REMOVED: &str = "Additional Info Removed";
pub const EVENT_SEEDED: &str = "Cultivar Seeded";

/// `details.source` of entries written without an authenticated user.
pub const SYSTEM_SOURCE: &str = "Anonymous or System";

pub const HISTORY_FIELD: &str = "history";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const CREATED_AT_FIELD: &str = "createdAt";

pub fn status_change_label(old: &str, new: &str) -> String {
    format!("Status changed from {} to {}", old, new)
}

pub fn status_mass_change_label(old: &str, new: &str) -> String {
    format!("Status mass-changed from {} to {}", old, new)
}

/// Who performed a mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Actor {
    User(UserIdentity),
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Actor::User(user) => Some(user.id.as_str()),
            Actor::System => None,
        }
    }

    /// Short label for log lines.
    pub fn describe(&self) -> &str {
        match self {
            Actor::User(user) => user.email.as_deref().unwrap_or(user.id.as_str()),
            Actor::System => SYSTEM_SOURCE,
        }
    }

    fn write_descriptors(&self, details: &mut Map<String, Value>) {
        match self {
            Actor::User(user) => {
                details.insert("userId".to_string(), json!(user.id));
                if let Some(email) = &user.email {
                    details.insert("userEmail".to_string(), json!(email));
                }
                if let Some(name) = &user.display_name {
                    details.insert("userDisplayName".to_string(), json!(name));
                }
            }
            Actor::System => {
                details.insert("source".to_string(), json!(SYSTEM_SOURCE));
            }
        }
    }
}

/// Kind of a single-document mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    Create,
    Update,
    ReviewAdded,
    ImageAdded,
    ImageRemoved,
    AdditionalInfoAdded,
    AdditionalInfoRemoved,
    Seed,
}

impl MutationKind {
    fn label(&self) -> &'static str {
        match self {
            MutationKind::Create => EVENT_CREATED,
            MutationKind::Update => EVENT_DETAILS_UPDATED,
            MutationKind::ReviewAdded => EVENT_REVIEW_ADDED,
            MutationKind::ImageAdded => EVENT_IMAGE_ADDED,
            MutationKind::ImageRemoved => EVENT_IMAGE_REMOVED,
            MutationKind::AdditionalInfoAdded => EVENT_INFO_ADDED,
            MutationKind::AdditionalInfoRemoved => EVENT_INFO_REMOVED,
            MutationKind::Seed => EVENT_SEEDED,
        }
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::ReviewAdded => "review_added",
            MutationKind::ImageAdded => "image_added",
            MutationKind::ImageRemoved => "image_removed",
            MutationKind::AdditionalInfoAdded => "info_added",
            MutationKind::AdditionalInfoRemoved => "info_removed",
            MutationKind::Seed => "seed",
        }
    }
}

/// The status transition described by a change set. Only a change from an
/// existing status counts: setting the first status on creation does not.
pub fn status_transition(changes: &ChangeSet) -> Option<(String, String)> {
    let change = changes.get("status")?;
    let old = change.old.as_str()?;
    let new = change.new.as_str()?;
    Some((old.to_string(), new.to_string()))
}

fn base_details(actor: &Actor, changes: &ChangeSet) -> Map<String, Value> {
    let mut details = Map::new();
    actor.write_descriptors(&mut details);
    if !changes.is_empty() {
        details.insert("updatedFields".to_string(), json!(changes.field_names()));
    }
    details
}

fn insert_status_change(details: &mut Map<String, Value>, old: &str, new: &str) {
    details.insert("statusChange".to_string(), json!({"old": old, "new": new}));
    details.insert("oldStatus".to_string(), json!(old));
    details.insert("newStatus".to_string(), json!(new));
}

/// Build the entry for a single-document mutation.
///
/// Label priority: a status transition, then creation, then the label of
/// `kind`. `extra` is merged into `details` last.
pub fn build_entry(
    kind: MutationKind,
    changes: &ChangeSet,
    actor: &Actor,
    extra: Map<String, Value>,
) -> HistoryEntry {
    let mut details = base_details(actor, changes);
    let event = match status_transition(changes) {
        Some((old, new)) if kind != MutationKind::Create && kind != MutationKind::Seed => {
            insert_status_change(&mut details, &old, &new);
            status_change_label(&old, &new)
        }
        _ => kind.label().to_string(),
    };
    if kind == MutationKind::Seed {
        details.insert("seed".to_string(), json!(true));
    }
    details.extend(extra);

    HistoryEntry {
        timestamp: now_iso(),
        event,
        user_id: actor.user_id().map(str::to_string),
        details,
    }
}

/// Build the entry for an explicit status change. The label names the
/// transition even when `old == new`.
pub fn build_status_entry(old: &str, new: &str, bulk: bool, actor: &Actor) -> HistoryEntry {
    let mut details = base_details(actor, &ChangeSet::default());
    if old != new {
        details.insert("updatedFields".to_string(), json!(["status"]));
    }
    insert_status_change(&mut details, old, new);
    let event = if bulk {
        details.insert("operation".to_string(), json!("batch update"));
        status_mass_change_label(old, new)
    } else {
        status_change_label(old, new)
    };

    HistoryEntry {
        timestamp: now_iso(),
        event,
        user_id: actor.user_id().map(str::to_string),
        details,
    }
}

/// A write setting the new value of every changed field.
pub fn changed_fields_write(changes: &ChangeSet) -> DocumentWrite {
    let mut write = DocumentWrite::new();
    for (field, change) in changes.iter() {
        write = write.set(field.clone(), change.new.clone());
    }
    write
}

/// Complete `write` with the `updatedAt` sentinel and the history append.
pub fn append_history(write: DocumentWrite, entry: &HistoryEntry) -> Result<DocumentWrite, StoreError> {
    let entry = serde_json::to_value(entry)?;
    Ok(write
        .server_timestamp(UPDATED_AT_FIELD)
        .append(HISTORY_FIELD, entry))
}
