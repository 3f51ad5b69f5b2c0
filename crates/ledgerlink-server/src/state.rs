//! Shared application state.

use std::sync::Arc;

use ledgerlink_auth::{AuthResult, AuthorizationClient, MemorySessionStore, SessionStore};
use ledgerlink_config::AppConfig;

/// State shared by all route handlers.
///
/// The configuration is immutable after load; the session store is the
/// only mutable shared state and guards its own consistency.
#[derive(Clone)]
pub struct AppState {
    /// Immutable application configuration.
    pub config: Arc<AppConfig>,
    /// Per-session authorization state.
    pub sessions: Arc<dyn SessionStore>,
    /// Provider-facing authorization client.
    pub authorizer: Arc<AuthorizationClient>,
}

impl AppState {
    /// Builds state with the in-memory session store.
    pub fn new(config: Arc<AppConfig>) -> AuthResult<Self> {
        let authorizer = Arc::new(AuthorizationClient::new(config.clone())?);
        Ok(Self {
            config,
            sessions: Arc::new(MemorySessionStore::new()),
            authorizer,
        })
    }
}
