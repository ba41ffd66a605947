//! Document and write models shared by all document store backends.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

// =============================================================================
// Documents
// =============================================================================

/// A stored document: its id plus the raw JSON fields.
///
/// Field presence is not guaranteed; readers are expected to normalize.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Timestamp assigned by the store when a [`FieldWrite::ServerTimestamp`]
/// sentinel is resolved. Persisted as `{"seconds": .., "nanoseconds": ..}`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StoreTimestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl StoreTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }

    /// Convert into a chrono datetime. `None` if out of chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanoseconds).single()
    }

    /// Parse a timestamp object as stored by this crate, also accepting the
    /// underscore-prefixed spelling (`_seconds`, `_nanoseconds`) found in
    /// exported documents.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let seconds = obj
            .get("seconds")
            .or_else(|| obj.get("_seconds"))
            .and_then(Value::as_i64)?;
        let nanoseconds = obj
            .get("nanoseconds")
            .or_else(|| obj.get("_nanoseconds"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if nanoseconds >= 1_000_000_000 {
            return None;
        }
        Some(Self {
            seconds,
            nanoseconds: nanoseconds as u32,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({"seconds": self.seconds, "nanoseconds": self.nanoseconds})
    }
}

// =============================================================================
// Writes
// =============================================================================

/// A single field mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldWrite {
    /// Replace the field with the given value.
    Set(Value),
    /// Replace the field with the store's current time.
    ServerTimestamp,
    /// Append values to an array field, creating it if absent. A non-array
    /// value in the field is replaced by a fresh array.
    ArrayAppend(Vec<Value>),
    /// Remove the field.
    Remove,
}

/// An ordered set of field mutations applied to one document as a unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentWrite {
    fields: Vec<(String, FieldWrite)>,
}

impl DocumentWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.push((field.into(), FieldWrite::Set(value)));
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldWrite::ServerTimestamp));
        self
    }

    pub fn append(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields
            .push((field.into(), FieldWrite::ArrayAppend(vec![value])));
        self
    }

    pub fn remove(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldWrite::Remove));
        self
    }

    pub fn push(&mut self, field: impl Into<String>, write: FieldWrite) {
        self.fields.push((field.into(), write));
    }

    pub fn fields(&self) -> &[(String, FieldWrite)] {
        &self.fields
    }

    /// Apply every field write to `data`, resolving sentinels against `now`.
    pub fn apply(&self, data: &mut Map<String, Value>, now: StoreTimestamp) {
        for (field, write) in &self.fields {
            match write {
                FieldWrite::Set(value) => {
                    data.insert(field.clone(), value.clone());
                }
                FieldWrite::ServerTimestamp => {
                    data.insert(field.clone(), now.to_value());
                }
                FieldWrite::ArrayAppend(values) => {
                    let slot = data
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(items) = slot {
                        items.extend(values.iter().cloned());
                    }
                }
                FieldWrite::Remove => {
                    data.remove(field);
                }
            }
        }
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Order for [`super::DocumentStore::list`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Sort documents in place. The sort is stable, so ties keep insertion order.
    pub fn sort(&self, documents: &mut [Document]) {
        documents.sort_by(|a, b| {
            let ordering = compare_field_values(a.data.get(&self.field), b.data.get(&self.field));
            match self.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });
    }
}

/// Rank of a value's type when comparing across types: missing and null first,
/// then booleans, numbers, timestamps, strings, and everything else.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(v) if StoreTimestamp::from_value(v).is_some() => 3,
        Some(Value::String(_)) => 4,
        Some(_) => 5,
    }
}

/// Total order over field values used by [`OrderBy`].
pub fn compare_field_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Some(x), Some(y)) => match (StoreTimestamp::from_value(x), StoreTimestamp::from_value(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}
