mod versioned_schema;

pub use versioned_schema::*;

/// Offset added to every schema version before it is written to `PRAGMA user_version`,
/// so that a fresh SQLite file (user_version = 0) is never mistaken for a known schema.
pub const BASE_DB_VERSION: usize = 77000;
