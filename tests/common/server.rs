//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database and media dir.

use super::constants::*;
use super::fixtures::{seed_records, test_users};
use async_trait::async_trait;
use cultivar_catalog_server::cultivar::CultivarManager;
use cultivar_catalog_server::document_store::SqliteDocumentStore;
use cultivar_catalog_server::identity::StaticTokenIdentityProvider;
use cultivar_catalog_server::review_generator::{
    GeneratedReview, ReviewGenerationError, ReviewGenerator, ReviewRequest,
};
use cultivar_catalog_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use cultivar_catalog_server::storage::LocalObjectStorage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Review generator returning a canned review, or failing on request
struct StubReviewGenerator;

#[async_trait]
impl ReviewGenerator for StubReviewGenerator {
    fn model(&self) -> &str {
        "stub"
    }

    async fn generate(
        &self,
        request: &ReviewRequest,
    ) -> Result<GeneratedReview, ReviewGenerationError> {
        if request.experience_text == FAILING_EXPERIENCE {
            return Err(ReviewGenerationError::Api {
                status: 500,
                message: "stub failure".to_string(),
            });
        }
        Ok(GeneratedReview {
            review: format!("{}: {}", request.cultivar_name, request.experience_text),
            sentiment_score: STUB_SENTIMENT,
        })
    }
}

/// Test server instance with an isolated, seeded catalog
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Manager for direct catalog access in tests
    pub manager: Arc<CultivarManager>,

    /// Where uploaded media lands
    pub media_path: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new seeded test server on a random port
    pub async fn spawn() -> Self {
        Self::spawn_with(true).await
    }

    /// Spawns a test server with an empty catalog
    pub async fn spawn_empty() -> Self {
        Self::spawn_with(false).await
    }

    async fn spawn_with(seed: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media_path = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_path).expect("Failed to create media dir");

        let store = Arc::new(
            SqliteDocumentStore::new(temp_dir.path().join("cultivars.db"))
                .expect("Failed to open document store"),
        );
        let storage = Arc::new(LocalObjectStorage::new(media_path.clone(), "/media"));
        let manager = Arc::new(CultivarManager::new(
            store,
            storage,
            Some(Arc::new(StubReviewGenerator)),
        ));

        if seed {
            let seeded = manager.seed(&seed_records()).expect("Failed to seed catalog");
            assert_eq!(seeded.len(), SEEDED_CULTIVARS);
        }

        let identity = Arc::new(StaticTokenIdentityProvider::new(test_users()));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            log_page_size: TEST_LOG_PAGE_SIZE,
            media_path: Some(media_path.clone()),
        };
        let app = make_app(ServerState::new(config, manager.clone(), identity));

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            manager,
            media_path,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Id of a seeded cultivar, looked up by name
    pub fn cultivar_id(&self, name: &str) -> String {
        self.manager
            .list_cultivars(Default::default())
            .expect("Failed to list cultivars")
            .into_iter()
            .find(|c| c.profile.name == name)
            .unwrap_or_else(|| panic!("No cultivar named {}", name))
            .id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
