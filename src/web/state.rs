use std::sync::Arc;

use crate::{
    Config,
    external::{self, ExternalResult, GeoLocator, Mailer, OAuthProvider},
    model::ModelManager,
};

/// Third-party collaborators, swappable in tests.
#[derive(Debug, Clone)]
pub struct Services {
    pub mailer: Arc<dyn Mailer>,
    pub geo: Arc<dyn GeoLocator>,
    pub oauth: Option<Arc<dyn OAuthProvider>>,
}

impl Services {
    pub fn from_config(config: &Config) -> ExternalResult<Self> {
        Ok(Self {
            mailer: external::mailer::from_config(config.mail())?,
            geo: external::geo::from_config(config.geo())?,
            oauth: external::oauth::from_config(config.oauth(), config.host().public_url())?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    mm: ModelManager,
    services: Services,
    config: &'static Config,
}

impl AppState {
    pub fn new(mm: ModelManager, services: Services, config: &'static Config) -> Self {
        Self {
            mm,
            services,
            config,
        }
    }

    pub fn pool(&self) -> &ModelManager {
        &self.mm
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.services.mailer.as_ref()
    }

    pub fn geo(&self) -> &dyn GeoLocator {
        self.services.geo.as_ref()
    }

    pub fn oauth(&self) -> Option<&dyn OAuthProvider> {
        self.services.oauth.as_deref()
    }

    pub fn config(&self) -> &'static Config {
        self.config
    }

    pub fn jwt_secret(&self) -> &str {
        self.config.app().jwt()
    }
}
