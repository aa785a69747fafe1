use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::{EntityStore, KeyValueStore};

use crate::session::SessionStore;

/// Everything a handler may touch, injected through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: EntityStore,
    pub sessions: SessionStore,
    pub cache: Arc<dyn KeyValueStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: EntityStore, kv: Arc<dyn KeyValueStore>) -> Self {
        let sessions = SessionStore::new(kv.clone(), config.session_ttl_seconds());
        Self {
            config: Arc::new(config),
            store,
            sessions,
            cache: kv,
        }
    }
}
