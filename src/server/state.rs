use axum::extract::FromRef;

use crate::cultivar::CultivarManager;
use crate::identity::IdentityProvider;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCultivarManager = Arc<CultivarManager>;
pub type GuardedIdentityProvider = Arc<dyn IdentityProvider>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub cultivar_manager: GuardedCultivarManager,
    pub identity_provider: GuardedIdentityProvider,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedCultivarManager {
    fn from_ref(input: &ServerState) -> Self {
        input.cultivar_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedIdentityProvider {
    fn from_ref(input: &ServerState) -> Self {
        input.identity_provider.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
