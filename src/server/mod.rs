mod api_error;
pub mod config;
mod cultivar_routes;
mod http_layers;
mod log_routes;
pub mod metrics;
pub mod server;
mod session;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server, run_server_with_shutdown};
pub use state::ServerState;
