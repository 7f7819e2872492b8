//! Session, pending-verification and OAuth-state cookies.

use chrono::Duration;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};
use uuid::Uuid;

use crate::{
    auth::{self, OTP_TTL_MINUTES, SESSION_TTL_HOURS, UserClaims, VerifyClaims},
    web::{WebError, WebResult},
};

pub static AUTH_TOKEN: &str = "SID";
pub static VERIFY_TOKEN: &str = "verify_email";
pub static OAUTH_STATE: &str = "oauth_state";

fn private_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie
}

fn drop_cookie(cookies: &Cookies, name: &'static str) {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookies.remove(cookie);
}

pub fn start_session(cookies: &Cookies, secret: &str, user_id: Uuid) -> WebResult<()> {
    let claims = UserClaims::new(user_id.to_string(), Duration::hours(SESSION_TTL_HOURS));
    let token = auth::generate_token(&claims, secret)
        .map_err(|e| WebError::server_crypt_error(e.into()))?;
    cookies.add(private_cookie(AUTH_TOKEN, token));
    Ok(())
}

pub fn end_session(cookies: &Cookies) {
    drop_cookie(cookies, AUTH_TOKEN);
}

/// Remembers which address is waiting for its code.
pub fn start_verification(cookies: &Cookies, secret: &str, email: &str) -> WebResult<()> {
    let claims = VerifyClaims::new(email, Duration::minutes(OTP_TTL_MINUTES));
    let token = auth::generate_token(&claims, secret)
        .map_err(|e| WebError::server_crypt_error(e.into()))?;
    cookies.add(private_cookie(VERIFY_TOKEN, token));
    Ok(())
}

/// Address of the pending verification, `None` when absent or expired.
pub fn pending_verification(cookies: &Cookies, secret: &str) -> Option<String> {
    let token = cookies.get(VERIFY_TOKEN)?;
    auth::process_token::<VerifyClaims, _>(token.value(), secret)
        .ok()
        .map(|data| data.claims.sub)
}

pub fn end_verification(cookies: &Cookies) {
    drop_cookie(cookies, VERIFY_TOKEN);
}

pub fn set_oauth_state(cookies: &Cookies, state: String) {
    cookies.add(private_cookie(OAUTH_STATE, state));
}

/// Consumes the stored state; true when it equals `returned`.
pub fn check_oauth_state(cookies: &Cookies, returned: &str) -> bool {
    let stored = cookies.get(OAUTH_STATE).map(|c| c.value().to_string());
    drop_cookie(cookies, OAUTH_STATE);
    matches!(stored, Some(s) if !s.is_empty() && s == returned)
}
