use crate::config::ConfigHandle;
use crate::platform::{LoginFlow, SessionFactory};
use crate::storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// Shared handles for the HTTP API.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub config: ConfigHandle,
    pub login: Arc<LoginFlow>,
}

impl AppContext {
    pub fn new(store: Arc<dyn Store>, sessions: Arc<dyn SessionFactory>, login_code_ttl: Duration) -> Self {
        let config = ConfigHandle::new(store.clone());
        let login = Arc::new(LoginFlow::new(
            store.clone(),
            config.clone(),
            sessions,
            login_code_ttl,
        ));
        Self { store, config, login }
    }
}
