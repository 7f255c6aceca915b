use crate::audit::AuditLogger;
use crate::config::Config;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Record store over whichever backend was resolved at startup.
    pub store: Store,
    /// Appends to the same backend as `store`.
    pub audit: AuditLogger,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            audit: AuditLogger::new(store.clone()),
            store,
            config,
        }
    }
}
