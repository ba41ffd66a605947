use super::RequestsLoggingLevel;
use crate::audit::DEFAULT_PAGE_SIZE;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Page size of the audit log listing.
    pub log_page_size: usize,
    /// Directory served under `/media`, if any.
    pub media_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            log_page_size: DEFAULT_PAGE_SIZE,
            media_path: None,
        }
    }
}
