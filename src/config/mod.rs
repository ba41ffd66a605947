mod file_config;

pub use file_config::{FileConfig, ReviewGeneratorConfig, UserConfig};

use crate::audit::DEFAULT_PAGE_SIZE;
use crate::identity::UserIdentity;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REVIEW_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REVIEW_TIMEOUT_SEC: u64 = 30;
const DEFAULT_PUBLIC_BASE_URL: &str = "/media";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub seed_file: Option<PathBuf>,
    pub log_page_size: usize,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub seed_file: Option<PathBuf>,
    pub log_page_size: usize,
    pub public_base_url: String,

    // Collaborators
    pub review_generator: Option<ReviewGeneratorSettings>,
    pub users: Vec<(String, UserIdentity)>,
}

#[derive(Debug, Clone)]
pub struct ReviewGeneratorSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.join("media"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let seed_file = file
            .seed_file
            .map(PathBuf::from)
            .or_else(|| cli.seed_file.clone());
        if let Some(seed_file) = &seed_file {
            if !seed_file.is_file() {
                bail!("Seed file not found: {:?}", seed_file);
            }
        }

        let log_page_size = file.log_page_size.unwrap_or(cli.log_page_size);
        let log_page_size = if log_page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            log_page_size
        };

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());

        // The review generator is only enabled by a [review_generator] section
        // with a base_url.
        let review_generator = file.review_generator.and_then(|rg| {
            rg.base_url.map(|base_url| ReviewGeneratorSettings {
                base_url,
                model: rg
                    .model
                    .unwrap_or_else(|| DEFAULT_REVIEW_MODEL.to_string()),
                api_key: rg.api_key,
                timeout: Duration::from_secs(
                    rg.timeout_sec.unwrap_or(DEFAULT_REVIEW_TIMEOUT_SEC),
                ),
            })
        });

        let mut users = Vec::with_capacity(file.users.len());
        for user in file.users {
            if user.id.trim().is_empty() {
                bail!("Configured user with token has an empty id");
            }
            users.push((
                user.token,
                UserIdentity {
                    id: user.id,
                    email: user.email,
                    display_name: user.display_name,
                },
            ));
        }

        Ok(Self {
            db_dir,
            media_path,
            port,
            metrics_port,
            logging_level,
            seed_file,
            log_page_size,
            public_base_url,
            review_generator,
            users,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("cultivars.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
