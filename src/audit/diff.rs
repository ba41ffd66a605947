//! Field-level diff between two persisted snapshots of a cultivar.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Bookkeeping fields never reported as changed.
pub const EXCLUDED_FIELDS: &[&str] = &["id", "createdAt", "updatedAt", "history", "reviews"];

/// How two values of the same field are compared.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComparisonPolicy {
    /// Structural equality, array order included.
    Exact,
    /// Arrays compare as multisets.
    Unordered,
}

const UNORDERED_FIELDS: &[&str] = &["effects", "medicalEffects", "flavors", "parents", "children"];

pub fn comparison_policy(field: &str) -> ComparisonPolicy {
    if UNORDERED_FIELDS.contains(&field) {
        ComparisonPolicy::Unordered
    } else {
        ComparisonPolicy::Exact
    }
}

fn multiset_eq(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = b.iter().collect();
    for item in a {
        match remaining.iter().position(|candidate| *candidate == item) {
            Some(pos) => {
                remaining.swap_remove(pos);
            }
            None => return false,
        }
    }
    true
}

/// Compare two field values. A missing value equals `null`.
pub fn values_equal(policy: ComparisonPolicy, old: Option<&Value>, new: Option<&Value>) -> bool {
    let old = old.unwrap_or(&Value::Null);
    let new = new.unwrap_or(&Value::Null);
    match (policy, old, new) {
        (ComparisonPolicy::Unordered, Value::Array(a), Value::Array(b)) => multiset_eq(a, b),
        _ => old == new,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Changed fields, keyed and ordered by field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<String, FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// Changed field names, sorted.
    pub fn field_names(&self) -> Vec<String> {
        self.changes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.changes.iter()
    }
}

/// Compare every key of `new` against `old`, skipping `excluded` keys.
pub fn diff_fields(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    excluded: &[&str],
) -> ChangeSet {
    let changes = new
        .iter()
        .filter(|(field, _)| !excluded.contains(&field.as_str()))
        .filter(|(field, value)| {
            !values_equal(comparison_policy(field), old.get(field.as_str()), Some(value))
        })
        .map(|(field, value)| {
            (
                field.clone(),
                FieldChange {
                    old: old.get(field).cloned().unwrap_or(Value::Null),
                    new: value.clone(),
                },
            )
        })
        .collect();
    ChangeSet { changes }
}
