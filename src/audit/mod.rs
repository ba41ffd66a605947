//! Audit trail: change detection, history entries, status transitions and
//! the catalog-wide log view.

pub mod diff;
pub mod history;
pub mod log_view;
pub mod status;

pub use diff::{diff_fields, ChangeSet, ComparisonPolicy, FieldChange, EXCLUDED_FIELDS};
pub use history::{Actor, MutationKind};
pub use log_view::{
    list_logs, DisplayLogEntry, LogFilter, LogPage, LogQuery, SortOrder, DEFAULT_PAGE_SIZE,
    KNOWN_EVENT_TYPES,
};
