//! Timestamp normalization.
//!
//! Persisted timestamps come in several shapes: store timestamp objects,
//! RFC 3339 strings and epoch milliseconds. Everything is exposed as
//! `YYYY-MM-DDTHH:MM:SS.mmmZ`.

use crate::document_store::StoreTimestamp;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    format_timestamp(Utc::now())
}

/// Parse a timestamp string. Accepts RFC 3339, naive date-times (taken as
/// UTC) and plain dates (start of day, UTC).
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse any persisted timestamp representation.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(_) => StoreTimestamp::from_value(value).and_then(|ts| ts.to_datetime()),
        _ => None,
    }
}

/// Normalize to an ISO string. Missing or unparsable input becomes now.
pub fn normalize_timestamp(value: Option<&Value>) -> String {
    value
        .and_then(parse_timestamp)
        .map(format_timestamp)
        .unwrap_or_else(now_iso)
}
