//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (tokens, seeded cultivars, etc.),
//! update only this file.

// ============================================================================
// Test Users
// ============================================================================

/// Bearer token of the admin user
pub const ADMIN_TOKEN: &str = "admin-token-123";

/// Id of the admin user
pub const ADMIN_ID: &str = "admin-uid";

/// Email of the admin user, used as its display name in the audit log
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Bearer token of a second editor
pub const EDITOR_TOKEN: &str = "editor-token-456";

/// Id of the second editor
pub const EDITOR_ID: &str = "editor-uid";

/// Display name of the second editor
pub const EDITOR_NAME: &str = "Eddie Editor";

// ============================================================================
// Seeded Catalog
// ============================================================================

/// Name of the first seeded cultivar
pub const CULTIVAR_1_NAME: &str = "Blue Dream";

/// Name of the second seeded cultivar
pub const CULTIVAR_2_NAME: &str = "Northern Lights";

/// Timestamp of the history entry carried over by the first seed record
pub const CULTIVAR_1_LEGACY_TIMESTAMP: &str = "2023-05-01T10:00:00.000Z";

/// Number of records in the seed file (one of them invalid)
pub const SEED_RECORDS: usize = 3;

/// Number of valid seeded cultivars
pub const SEEDED_CULTIVARS: usize = 2;

// ============================================================================
// Review Generator Stub
// ============================================================================

/// Sentiment score the stub generator returns for every review
pub const STUB_SENTIMENT: f64 = 0.75;

/// Experience text that makes the stub generator fail
pub const FAILING_EXPERIENCE: &str = "please fail";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Default timeout for HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// A tiny PNG, enough for content sniffing
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89,
];

/// Log page size configured for the test server
pub const TEST_LOG_PAGE_SIZE: usize = 5;
