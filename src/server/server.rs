use anyhow::{Context, Result};
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use tower_http::services::ServeDir;
use tracing::{error, info};

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::cultivar_routes::cultivar_routes;
use super::log_routes::log_routes;
use super::metrics::metrics_handler;
use super::session::Session;
use super::{log_requests, state::*, ServerConfig};
use crate::cultivar::CultivarManager;
use crate::identity::{IdentityProvider, UserIdentity};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub cultivars: Option<usize>,
    pub user: Option<UserIdentity>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let cultivars = state
        .cultivar_manager
        .count()
        .inspect_err(|err| error!("Failed to count cultivars: {}", err))
        .ok();
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        cultivars,
        user: session.map(|s| s.user),
    };
    Json(stats)
}

async fn get_me(session: Session) -> Response {
    Json(session.user).into_response()
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        cultivar_manager: Arc<CultivarManager>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            cultivar_manager,
            identity_provider,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/", get(home))
        .route("/v1/me", get(get_me))
        .nest("/v1/cultivars", cultivar_routes())
        .nest("/v1/logs", log_routes())
        .with_state(state.clone());

    let mut app = match &state.config.media_path {
        Some(media_path) => api_routes.nest_service("/media", ServeDir::new(media_path)),
        None => api_routes,
    };

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));
    app
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve the API on `config.port` and metrics on `metrics_port` until
/// `shutdown` resolves.
pub async fn run_server_with_shutdown<F>(
    config: ServerConfig,
    cultivar_manager: Arc<CultivarManager>,
    identity_provider: Arc<dyn IdentityProvider>,
    metrics_port: u16,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = config.port;
    let state = ServerState::new(config, cultivar_manager, identity_provider);
    let app = make_app(state);

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn run_server(
    config: ServerConfig,
    cultivar_manager: Arc<CultivarManager>,
    identity_provider: Arc<dyn IdentityProvider>,
    metrics_port: u16,
) -> Result<()> {
    run_server_with_shutdown(
        config,
        cultivar_manager,
        identity_provider,
        metrics_port,
        async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Shutting down");
        },
    )
    .await
}
