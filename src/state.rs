use crate::config::Config;
use crate::services::github::OAuth2ServiceProvider;
use crate::session::SessionStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub github: Arc<dyn OAuth2ServiceProvider>,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(github: Arc<dyn OAuth2ServiceProvider>, config: Arc<Config>) -> Self {
        Self {
            github,
            sessions: SessionStore::new(config.session.ttl),
            config,
        }
    }
}
