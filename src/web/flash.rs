//! One-shot messages carried across a redirect in a cookie.
//!
//! The cookie holds a short-lived JWT signed with the application secret, so a
//! client cannot plant messages of its own.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies, cookie::SameSite};

use crate::{
    auth::{generate_token, process_token},
    config::Config,
};

pub static FLASH_COOKIE: &str = "flash";

const FLASH_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlashClaims {
    #[serde(flatten)]
    flash: Flash,
    exp: i64,
}

impl Flash {
    fn encode(&self, key: &str) -> Option<String> {
        let claims = FlashClaims {
            flash: self.clone(),
            exp: (chrono::Utc::now() + Duration::minutes(FLASH_TTL_MINUTES)).timestamp(),
        };
        generate_token(&claims, key).ok()
    }

    fn decode(raw: &str, key: &str) -> Option<Self> {
        process_token::<FlashClaims, _>(raw, key)
            .ok()
            .map(|data| data.claims.flash)
    }
}

fn signing_key() -> Option<&'static str> {
    Config::get().map(|c| c.app().jwt())
}

fn flash_cookie(kind: FlashKind, message: &str, key: &str) -> Option<Cookie<'static>> {
    let flash = Flash {
        kind,
        message: message.to_string(),
    };
    let value = flash.encode(key)?;

    let mut cookie = Cookie::new(FLASH_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    Some(cookie)
}

fn push(cookies: &Cookies, kind: FlashKind, message: &str) {
    let Some(key) = signing_key() else {
        tracing::warn!("flash dropped, configuration not loaded");
        return;
    };
    if let Some(cookie) = flash_cookie(kind, message, key) {
        cookies.add(cookie);
    }
}

/// `Set-Cookie` value for responses built outside a handler.
pub fn error_header(message: &str) -> Option<String> {
    flash_cookie(FlashKind::Error, message, signing_key()?).map(|c| c.to_string())
}

pub fn success(cookies: &Cookies, message: &str) {
    push(cookies, FlashKind::Success, message);
}

pub fn error(cookies: &Cookies, message: &str) {
    push(cookies, FlashKind::Error, message);
}

/// Reads and clears the pending message. Unsigned or expired values are dropped.
pub fn take(cookies: &Cookies) -> Option<Flash> {
    let raw = cookies.get(FLASH_COOKIE)?;
    let flash = signing_key().and_then(|key| Flash::decode(raw.value(), key));

    let mut removal = Cookie::new(FLASH_COOKIE, "");
    removal.set_path("/");
    cookies.remove(removal);

    flash
}
