use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{find_config_file, read_config};

mod error;
pub use error::{ConfigError, ConfigResult};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
    #[serde(default)]
    mail: Mail,
    #[serde(default)]
    geo: Geo,
    #[serde(default)]
    oauth: OAuth,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    bindto: String,
    #[serde(default = "default_public_url")]
    public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
    #[serde(default = "default_admin_password")]
    admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mail {
    #[serde(default)]
    api_key: String,
    #[serde(default = "default_sender_email")]
    sender_email: String,
    #[serde(default = "default_sender_name")]
    sender_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geo {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_geo_url")]
    base_url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OAuth {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
}

fn default_public_url() -> String {
    String::from("http://localhost:5000")
}

fn default_admin_password() -> String {
    String::from("admin123")
}

fn default_sender_email() -> String {
    String::from("noreply@astrodatahub.com")
}

fn default_sender_name() -> String {
    String::from("AstroDataHub")
}

fn default_geo_url() -> String {
    String::from("http://ip-api.com")
}

impl Default for Mail {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

impl Default for Geo {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_geo_url(),
        }
    }
}

impl Config {
    /// The loaded configuration, `None` before [`Config::get_or_init`] ran.
    pub fn get() -> Option<&'static Config> {
        CONFIG.get()
    }

    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                let read_cfg = |use_local| -> ConfigResult<Self> {
                    let bytes = read_config(use_local)?;
                    Self::from_slice(&bytes)
                };

                let mut config = match read_cfg(use_local) {
                    Ok(c) => c,
                    Err(e) => {
                        if !matches!(e, error::ConfigError::ConfigNotFound) {
                            crate::error::log_error(&e);
                        }
                        tracing::error!("Config not found.");
                        std::process::exit(1);
                    }
                };

                config.apply_env(|key| std::env::var(key).ok());
                config
            })
            .await
    }

    pub fn from_slice(bytes: &[u8]) -> ConfigResult<Self> {
        let config: Self = toml::from_slice(bytes)?;
        Ok(config)
    }

    /// Secrets and deployment specifics may come from the environment instead of the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut self.app.database_uri, "DATABASE_URL");
        set(&mut self.app.jwt, "JWT_SECRET");
        set(&mut self.mail.api_key, "BREVO_API_KEY");
        set(&mut self.mail.sender_email, "SENDER_EMAIL");
        set(&mut self.oauth.client_id, "GOOGLE_CLIENT_ID");
        set(&mut self.oauth.client_secret, "GOOGLE_CLIENT_SECRET");
        set(&mut self.host.public_url, "PUBLIC_URL");
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }

    #[inline]
    pub fn mail(&self) -> &Mail {
        &self.mail
    }

    #[inline]
    pub fn geo(&self) -> &Geo {
        &self.geo
    }

    #[inline]
    pub fn oauth(&self) -> &OAuth {
        &self.oauth
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }

    #[inline]
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }

    #[inline]
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }
}

impl Mail {
    #[inline]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[inline]
    pub fn sender_email(&self) -> &str {
        &self.sender_email
    }

    #[inline]
    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }
}

impl Geo {
    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl OAuth {
    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[inline]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    const MINIMAL: &str = r#"
        [host]
        bindto = "0.0.0.0:8080"

        [app]
        jwt = "secret"
        database_uri = "sqlite::memory:"
    "#;

    #[tokio::test]
    async fn config_test() {
        let config = Config::get_or_init(true).await;
        assert_eq!(config.host().bindto(), "127.0.0.1:5000"); // defaults
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::from_slice(MINIMAL.as_bytes()).unwrap();
        assert_eq!(config.host().public_url(), "http://localhost:5000");
        assert_eq!(config.app().admin_password(), "admin123");
        assert!(!config.app().docs());
        assert!(!config.geo().enabled());
        assert_eq!(config.mail().sender_name(), "AstroDataHub");
        assert!(!config.oauth().is_configured());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::from_slice(MINIMAL.as_bytes()).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "sqlite://other.sqlite"),
            ("BREVO_API_KEY", "xkeysib-123"),
            ("GOOGLE_CLIENT_ID", ""),
            ("PUBLIC_URL", "https://astro.example/"),
        ]);

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.app().database_uri(), "sqlite://other.sqlite");
        assert_eq!(config.mail().api_key(), "xkeysib-123");
        // empty values never clobber the file
        assert_eq!(config.oauth().client_id(), "");
        assert_eq!(config.host().public_url(), "https://astro.example");
        assert_eq!(config.app().jwt(), "secret");
    }
}
