use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::{fmt::Debug, path::Path, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cultivar_catalog_server::config::{AppConfig, CliConfig, FileConfig};
use cultivar_catalog_server::cultivar::CultivarManager;
use cultivar_catalog_server::document_store::SqliteDocumentStore;
use cultivar_catalog_server::identity::StaticTokenIdentityProvider;
use cultivar_catalog_server::review_generator::{OpenAiReviewGenerator, ReviewGenerator};
use cultivar_catalog_server::server::{self, run_server, RequestsLoggingLevel, ServerConfig};
use cultivar_catalog_server::storage::LocalObjectStorage;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the catalog database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Directory for uploaded images and documents. Defaults to <db-dir>/media.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// Path to a TOML config file. Values there override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// JSON array of cultivar records, loaded when the catalog is empty.
    #[clap(long, value_parser = parse_path)]
    pub seed_file: Option<PathBuf>,

    /// Number of audit log entries per page.
    #[clap(long, default_value_t = 25)]
    pub log_page_size: usize,

    /// Public URL prefix under which media files are reachable.
    #[clap(long)]
    pub public_base_url: Option<String>,
}

fn read_seed_records(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {:?}", path))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Seed file {:?} is not valid JSON", path))?;
    let Value::Array(items) = value else {
        bail!("Seed file {:?} must contain a JSON array", path);
    };
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(record) => records.push(record),
            other => warn!("Skipping seed item {}: not an object ({})", index, other),
        }
    }
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        media_path: cli_args.media_path,
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        logging_level: cli_args.logging_level,
        seed_file: cli_args.seed_file,
        log_page_size: cli_args.log_page_size,
        public_base_url: cli_args.public_base_url,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let store = Arc::new(SqliteDocumentStore::new(config.catalog_db_path())?);

    std::fs::create_dir_all(&config.media_path)
        .with_context(|| format!("Failed to create media directory {:?}", config.media_path))?;
    let storage = Arc::new(LocalObjectStorage::new(
        config.media_path.clone(),
        config.public_base_url.clone(),
    ));

    let review_generator: Option<Arc<dyn ReviewGenerator>> =
        config.review_generator.as_ref().map(|settings| {
            info!(
                "Review generator configured at {} (model {})",
                settings.base_url, settings.model
            );
            Arc::new(OpenAiReviewGenerator::new(
                settings.base_url.clone(),
                settings.model.clone(),
                settings.api_key.clone(),
                settings.timeout,
            )) as Arc<dyn ReviewGenerator>
        });
    if review_generator.is_none() {
        warn!("No review generator configured, reviews will be rejected");
    }

    let identity_provider = Arc::new(StaticTokenIdentityProvider::new(config.users.clone()));
    info!("{} users configured", identity_provider.users_count());

    let cultivar_manager = Arc::new(CultivarManager::new(store, storage, review_generator));

    if let Some(seed_file) = &config.seed_file {
        let existing = cultivar_manager.count()?;
        if existing == 0 {
            let records = read_seed_records(seed_file)?;
            let seeded = cultivar_manager.seed(&records)?;
            info!("Seeded {} of {} cultivars", seeded.len(), records.len());
        } else {
            info!("Catalog already holds {} cultivars, skipping seed", existing);
        }
    }

    // Initialize metrics system
    info!("Initializing metrics...");
    server::metrics::init_metrics();
    server::metrics::set_catalog_size(cultivar_manager.count()?);

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        log_page_size: config.log_page_size,
        media_path: Some(config.media_path.clone()),
    };

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    run_server(
        server_config,
        cultivar_manager,
        identity_provider,
        config.metrics_port,
    )
    .await
}
