//! Catalog-wide audit log view.
//!
//! Flattens every cultivar's history into one sequence, then filters, sorts
//! and pages it. Malformed entries are repaired or dropped, never reported.

use super::history::{
    EVENT_CREATED, EVENT_DETAILS_UPDATED, EVENT_IMAGE_ADDED, EVENT_IMAGE_REMOVED,
    EVENT_INFO_ADDED, EVENT_INFO_REMOVED, EVENT_REVIEW_ADDED, EVENT_SEEDED,
};
use crate::cultivar::timestamp::parse_timestamp_str;
use crate::cultivar::{Cultivar, HistoryEntry};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PAGE_SIZE: usize = 25;

pub const SEED_USER_DISPLAY: &str = "System (Seed)";
pub const UNKNOWN_USER_DISPLAY: &str = "System/Unknown";

/// Event labels the event-type filter accepts. Matching is by substring, so
/// "Status changed" covers every single-status transition label.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    EVENT_CREATED,
    EVENT_DETAILS_UPDATED,
    "Status changed",
    "Status mass-changed",
    EVENT_REVIEW_ADDED,
    EVENT_IMAGE_ADDED,
    EVENT_IMAGE_REMOVED,
    EVENT_INFO_ADDED,
    EVENT_INFO_REMOVED,
    EVENT_SEEDED,
];

/// Canonical spelling of a known event type, matched case-insensitively.
pub fn known_event_type(label: &str) -> Option<&'static str> {
    let label = label.trim();
    KNOWN_EVENT_TYPES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(label))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayLogEntry {
    pub cultivar_id: String,
    pub cultivar_name: String,
    pub timestamp: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub user_display: String,
    pub details: Map<String, Value>,
}

fn non_blank<'a>(details: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    details
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_seed(details: &Map<String, Value>) -> bool {
    match details.get("seed") {
        Some(Value::Bool(seed)) => *seed,
        Some(Value::String(seed)) => seed.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Who to show for an entry: seed marker, then the user (email, display
/// name, raw id), then a free-text source, then unknown.
pub fn resolve_user_display(entry: &HistoryEntry) -> String {
    let details = &entry.details;
    if is_seed(details) {
        return SEED_USER_DISPLAY.to_string();
    }
    if let Some(user_id) = entry.user_id.as_deref().filter(|id| !id.trim().is_empty()) {
        return non_blank(details, "userEmail")
            .or_else(|| non_blank(details, "userDisplayName"))
            .unwrap_or(user_id)
            .to_string();
    }
    non_blank(details, "source")
        .unwrap_or(UNKNOWN_USER_DISPLAY)
        .to_string()
}

/// Every non-blank history entry of every cultivar, in cultivar then history
/// order.
pub fn flatten_logs(cultivars: &[Cultivar]) -> Vec<DisplayLogEntry> {
    cultivars
        .iter()
        .flat_map(|cultivar| {
            cultivar
                .history
                .iter()
                .filter(|entry| !entry.event.trim().is_empty())
                .map(move |entry| DisplayLogEntry {
                    cultivar_id: cultivar.id.clone(),
                    cultivar_name: cultivar.profile.name.clone(),
                    timestamp: entry.timestamp.clone(),
                    event: entry.event.clone(),
                    user_id: entry.user_id.clone(),
                    user_display: resolve_user_display(entry),
                    details: entry.details.clone(),
                })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogFilter {
    pub cultivar_name: Option<String>,
    pub user: Option<String>,
    pub event_types: Vec<String>,
    /// Inclusive, from the start of the day (UTC).
    pub from: Option<NaiveDate>,
    /// Inclusive, to the end of the day (UTC).
    pub to: Option<NaiveDate>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl LogFilter {
    fn has_date_bounds(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    fn matches(&self, entry: &DisplayLogEntry) -> bool {
        if let Some(name) = self.cultivar_name.as_deref().filter(|s| !s.is_empty()) {
            if !contains_ignore_case(&entry.cultivar_name, name) {
                return false;
            }
        }
        if let Some(user) = self.user.as_deref().filter(|s| !s.is_empty()) {
            let raw_id_matches = entry
                .user_id
                .as_deref()
                .map(|id| contains_ignore_case(id, user))
                .unwrap_or(false);
            if !contains_ignore_case(&entry.user_display, user) && !raw_id_matches {
                return false;
            }
        }
        if !self.event_types.is_empty()
            && !self
                .event_types
                .iter()
                .any(|label| contains_ignore_case(&entry.event, label))
        {
            return false;
        }
        if self.has_date_bounds() {
            let Some(timestamp) = parse_timestamp_str(&entry.timestamp) else {
                return false;
            };
            if let Some(from) = self.from.and_then(start_of_day) {
                if timestamp < from {
                    return false;
                }
            }
            if let Some(end) = self
                .to
                .and_then(|to| to.checked_add_signed(Duration::days(1)))
                .and_then(start_of_day)
            {
                if timestamp >= end {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogQuery {
    pub filter: LogFilter,
    pub order: SortOrder,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            filter: LogFilter::default(),
            order: SortOrder::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub entries: Vec<DisplayLogEntry>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Stable sort by timestamp. Unparsable timestamps go last, in input order,
/// whatever the direction.
pub fn sort_logs(entries: Vec<DisplayLogEntry>, order: SortOrder) -> Vec<DisplayLogEntry> {
    let (mut dated, undated): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .map(|entry| (parse_timestamp_str(&entry.timestamp), entry))
        .partition(|(timestamp, _)| timestamp.is_some());
    dated.sort_by(|(a, _), (b, _)| match order {
        SortOrder::Asc => a.cmp(b),
        SortOrder::Desc => b.cmp(a),
    });
    dated
        .into_iter()
        .chain(undated)
        .map(|(_, entry)| entry)
        .collect()
}

/// Filter, sort and page the flattened history of `cultivars`.
pub fn list_logs(cultivars: &[Cultivar], query: &LogQuery) -> LogPage {
    let filtered: Vec<DisplayLogEntry> = flatten_logs(cultivars)
        .into_iter()
        .filter(|entry| query.filter.matches(entry))
        .collect();
    let sorted = sort_logs(filtered, query.order);

    let page_size = query.page_size.max(1);
    let total = sorted.len();
    let total_pages = total.div_ceil(page_size);
    let entries = match query.page.checked_sub(1) {
        Some(index) => sorted
            .into_iter()
            .skip(index.saturating_mul(page_size))
            .take(page_size)
            .collect(),
        None => Vec::new(),
    };

    LogPage {
        entries,
        page: query.page,
        page_size,
        total,
        total_pages,
    }
}
