//! Google sign-in, authorization-code flow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::error::{ExternalError, ExternalResult};
use crate::config::OAuth;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub email: String,
    pub display_name: String,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync + std::fmt::Debug {
    /// Where to send the browser, carrying `state` back to the callback.
    fn authorize_url(&self, state: &str) -> ExternalResult<String>;

    /// Exchanges an authorization code for the signed-in profile.
    async fn fetch_profile(&self, code: &str) -> ExternalResult<OAuthProfile>;
}

/// `None` when no client credentials are configured.
pub fn from_config(
    oauth: &OAuth,
    public_url: &str,
) -> ExternalResult<Option<Arc<dyn OAuthProvider>>> {
    if !oauth.is_configured() {
        return Ok(None);
    }
    let redirect_uri = format!("{public_url}/auth/google/callback");
    Ok(Some(Arc::new(GoogleOAuth::new(oauth, redirect_uri)?)))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
}

#[derive(Debug)]
pub struct GoogleOAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http_client: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(oauth: &OAuth, redirect_uri: String) -> ExternalResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client_id: oauth.client_id().to_string(),
            client_secret: oauth.client_secret().to_string(),
            redirect_uri,
            http_client,
        })
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str) -> ExternalResult<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )?;
        Ok(url.into())
    }

    #[tracing::instrument(skip_all)]
    async fn fetch_profile(&self, code: &str) -> ExternalResult<OAuthProfile> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::from_response("google token", response).await);
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .http_client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::from_response("google userinfo", response).await);
        }
        let info: UserInfo = response.json().await?;

        let email = info.email.ok_or(ExternalError::MissingField {
            service: "google userinfo",
            field: "email",
        })?;
        let display_name = info.given_name.or(info.name).unwrap_or_default();
        Ok(OAuthProfile {
            email,
            display_name,
        })
    }
}

/// Hands out one fixed profile, for tests.
#[derive(Debug, Clone)]
pub struct StaticOAuth {
    profile: OAuthProfile,
}

impl StaticOAuth {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            profile: OAuthProfile {
                email: email.into(),
                display_name: display_name.into(),
            },
        }
    }
}

#[async_trait]
impl OAuthProvider for StaticOAuth {
    fn authorize_url(&self, state: &str) -> ExternalResult<String> {
        let url = Url::parse_with_params("http://oauth.invalid/authorize", &[("state", state)])?;
        Ok(url.into())
    }

    async fn fetch_profile(&self, _code: &str) -> ExternalResult<OAuthProfile> {
        Ok(self.profile.clone())
    }
}

/// Username for an account created through OAuth: the first word of the display
/// name lower-cased, or the e-mail local part, followed by `suffix`.
pub fn username_from_profile(profile: &OAuthProfile, suffix: u16) -> String {
    let base: String = profile
        .display_name
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();

    let base = if base.is_empty() {
        profile
            .email
            .split('@')
            .next()
            .unwrap_or("explorer")
            .to_lowercase()
    } else {
        base
    };
    format!("{base}{suffix}")
}
