//! Registration with e-mail OTP, password and Google sign-in, country onboarding.

use axum::{
    Form, Router,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    auth::{self, OTP_TTL_MINUTES, hash_password, verify_password},
    error::log_error,
    external::oauth::username_from_profile,
    model::{
        CrudRepository, ResourceTyped,
        entity::{UserEntity, UserEntityCreateUpdate},
    },
    utils::countries::{COUNTRIES, normalize_code},
    web::{
        AppState, AuthenticatedUser, RequestContext, UserRole, WebError, WebResult, flash,
        routes::{back_or, field, secret},
        session,
        views::{self, CountryOption, Layout, LoginPage, RegisterPage, SelectCountryPage, VerifyPage},
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/login", get(login_page_handler).post(login_handler))
        .route("/register", get(register_page_handler).post(register_handler))
        .route("/verify", get(verify_page_handler).post(verify_handler))
        .route("/resend-otp", post(resend_otp_handler))
        .route("/select-country", get(select_country_handler))
        .route("/update-country", post(update_country_handler))
        .route("/toggle-global", post(toggle_global_handler))
        .route("/google", get(google_handler))
        .route("/google/callback", get(google_callback_handler))
        .route("/logout", get(logout_handler).post(logout_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Username or e-mail.
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpForm {
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountryForm {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Users without a country finish onboarding first.
fn landing_for(user: &UserEntity) -> Redirect {
    if user.country().is_none() {
        Redirect::to("/auth/select-country")
    } else {
        Redirect::to("/")
    }
}

fn fetch_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(UserEntity::get_resource_type(), e)
}

async fn login_page(
    state: &AppState,
    ctx: &RequestContext,
    cookies: &Cookies,
    identity: &str,
    error: Option<&str>,
) -> WebResult<Response> {
    let mut layout = Layout::build(state, ctx, cookies, "Login").await;
    if let Some(error) = error {
        layout = layout.with_error(error);
    }
    let page = LoginPage {
        layout,
        identity: identity.to_string(),
        google_enabled: state.oauth().is_some(),
    };
    Ok(views::render(&page)?.into_response())
}

async fn login_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<Response> {
    if ctx.maybe_user().is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    login_page(&state, &ctx, &cookies, "", None).await
}

#[tracing::instrument(skip_all)]
async fn login_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    let identity = field(&form.username).unwrap_or_default();
    let password = form.password.unwrap_or_default();

    let found = if identity.is_empty() {
        None
    } else {
        UserEntity::find_by_identity(state.pool(), &AuthenticatedUser::admin(), identity)
            .await
            .map_err(fetch_error)?
    };

    let user = match found {
        Some(user) => {
            let valid = verify_password(user.hash(), &password)
                .map_err(WebError::server_crypt_error)?;
            valid.then_some(user)
        }
        None => None,
    };

    let Some(user) = user else {
        let message = WebError::auth_invalid_credentials().client_display();
        return login_page(&state, &ctx, &cookies, identity, Some(&message)).await;
    };

    if user.role() == UserRole::Admin {
        session::start_session(&cookies, state.jwt_secret(), user.id())?;
        tracing::info!("administrator {} signed in", user.username());
        return Ok(Redirect::to("/admin/dashboard").into_response());
    }

    if !user.is_verified() {
        session::start_verification(&cookies, state.jwt_secret(), user.email())?;
        return login_page(&state, &ctx, &cookies, identity, Some("Account not verified.")).await;
    }

    session::start_session(&cookies, state.jwt_secret(), user.id())?;
    Ok(landing_for(&user).into_response())
}

async fn register_page(
    state: &AppState,
    ctx: &RequestContext,
    cookies: &Cookies,
    form: Option<&RegisterForm>,
    error: &str,
) -> WebResult<Response> {
    let page = RegisterPage {
        layout: Layout::build(state, ctx, cookies, "Register").await.with_error(error),
        username: form
            .and_then(|f| field(&f.username))
            .unwrap_or_default()
            .to_string(),
        email: form.and_then(|f| field(&f.email)).unwrap_or_default().to_string(),
        google_enabled: state.oauth().is_some(),
    };
    Ok(views::render(&page)?.into_response())
}

async fn register_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<Response> {
    if ctx.maybe_user().is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    register_page(&state, &ctx, &cookies, None, "").await
}

/// Issues a fresh OTP to `user` and mails it.
async fn send_new_otp(state: &AppState, user: &mut UserEntity) -> WebResult<()> {
    let otp = auth::generate_otp();
    user.set_otp(
        state.pool(),
        &otp,
        Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
    )
    .await
    .map_err(fetch_error)?;

    state
        .mailer()
        .send_otp(user.email(), &otp)
        .await
        .map_err(WebError::server_external_error)
}

#[tracing::instrument(skip_all)]
async fn register_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> WebResult<Response> {
    let (Some(username), Some(email), Some(password)) = (
        field(&form.username),
        field(&form.email),
        secret(&form.password),
    ) else {
        return register_page(&state, &ctx, &cookies, Some(&form), "All fields are required.").await;
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return register_page(
            &state,
            &ctx,
            &cookies,
            Some(&form),
            "Password must be at least 6 characters.",
        )
        .await;
    }

    let admin = AuthenticatedUser::admin();
    let conflict = UserEntity::find_conflict(state.pool(), &admin, username, email, None)
        .await
        .map_err(fetch_error)?;
    if conflict.is_some() {
        let message = WebError::registration_conflict().client_display();
        return register_page(&state, &ctx, &cookies, Some(&form), &message).await;
    }

    let hash = hash_password(password).map_err(WebError::server_crypt_error)?;
    let created = UserEntity::create(
        state.pool(),
        &admin,
        UserEntityCreateUpdate {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash,
            role: UserRole::User.to_string(),
            is_verified: false,
        },
    )
    .await;

    let mut user = match created {
        Ok(user) => user,
        Err(e) if e.is_unique_violation() => {
            let message = WebError::registration_conflict().client_display();
            return register_page(&state, &ctx, &cookies, Some(&form), &message).await;
        }
        Err(e) => return Err(fetch_error(e)),
    };

    if let Err(e) = send_new_otp(&state, &mut user).await {
        log_error(&e);
        return register_page(
            &state,
            &ctx,
            &cookies,
            Some(&form),
            "Server error during registration.",
        )
        .await;
    }

    session::start_verification(&cookies, state.jwt_secret(), user.email())?;
    tracing::info!("registered {}, awaiting verification", user.username());
    Ok(Redirect::to("/auth/verify").into_response())
}

async fn verify_page(
    state: &AppState,
    ctx: &RequestContext,
    cookies: &Cookies,
    email: &str,
    layout_fn: impl FnOnce(Layout) -> Layout,
) -> WebResult<Response> {
    let page = VerifyPage {
        layout: layout_fn(Layout::build(state, ctx, cookies, "Verify Email").await),
        email: email.to_string(),
    };
    Ok(views::render(&page)?.into_response())
}

async fn verify_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<Response> {
    let Some(email) = session::pending_verification(&cookies, state.jwt_secret()) else {
        return Ok(Redirect::to("/auth/register").into_response());
    };
    verify_page(&state, &ctx, &cookies, &email, |l| l).await
}

#[tracing::instrument(skip_all)]
async fn verify_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<OtpForm>,
) -> WebResult<Response> {
    let Some(email) = session::pending_verification(&cookies, state.jwt_secret()) else {
        return Ok(Redirect::to("/auth/register").into_response());
    };

    let user = UserEntity::find_by_email(state.pool(), &AuthenticatedUser::admin(), &email)
        .await
        .map_err(fetch_error)?;
    let code = field(&form.otp).unwrap_or_default();

    let Some(mut user) = user.filter(|u| u.otp_matches(code, Utc::now())) else {
        return verify_page(&state, &ctx, &cookies, &email, |l| l.with_error("Invalid code.")).await;
    };

    user.mark_verified(state.pool()).await.map_err(fetch_error)?;
    session::end_verification(&cookies);
    session::start_session(&cookies, state.jwt_secret(), user.id())?;
    tracing::info!("{} verified their address", user.username());
    Ok(landing_for(&user).into_response())
}

async fn resend_otp_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<Response> {
    let Some(email) = session::pending_verification(&cookies, state.jwt_secret()) else {
        return Ok(Redirect::to("/auth/register").into_response());
    };
    let Some(mut user) = UserEntity::find_by_email(state.pool(), &AuthenticatedUser::admin(), &email)
        .await
        .map_err(fetch_error)?
    else {
        session::end_verification(&cookies);
        return Ok(Redirect::to("/auth/register").into_response());
    };

    match send_new_otp(&state, &mut user).await {
        Ok(()) => verify_page(&state, &ctx, &cookies, &email, |l| l.with_success("New code sent!")).await,
        Err(e) => {
            log_error(&e);
            verify_page(&state, &ctx, &cookies, &email, |l| {
                l.with_error("Failed to resend code.")
            })
            .await
        }
    }
}

async fn select_country_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let current = user.country().unwrap_or_default();

    let page = SelectCountryPage {
        layout: Layout::build(&state, &ctx, &cookies, "Complete Your Profile").await,
        countries: COUNTRIES
            .iter()
            .map(|(code, name)| CountryOption {
                code: code.to_string(),
                name: name.to_string(),
                selected: current.eq_ignore_ascii_case(code),
            })
            .collect(),
    };
    views::render(&page)
}

async fn update_country_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<CountryForm>,
) -> WebResult<Redirect> {
    let user = ctx.user()?;
    let Some(code) = field(&form.country).and_then(normalize_code) else {
        flash::error(&cookies, "Please select a valid country.");
        return Ok(Redirect::to("/auth/select-country"));
    };

    let mut entity = UserEntity::find_by_id(state.pool(), user, user.user_id())
        .await
        .map_err(fetch_error)?
        .ok_or(WebError::auth_required())?;
    entity.set_country(state.pool(), &code).await.map_err(fetch_error)?;

    flash::success(&cookies, &format!("Profile updated! Showing courses for {code}."));
    Ok(Redirect::to("/courses"))
}

async fn toggle_global_handler(
    ctx: RequestContext,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> WebResult<Redirect> {
    let user = ctx.user()?;
    let mut entity = UserEntity::find_by_id(state.pool(), user, user.user_id())
        .await
        .map_err(fetch_error)?
        .ok_or(WebError::auth_required())?;
    entity.toggle_global(state.pool()).await.map_err(fetch_error)?;

    Ok(Redirect::to(&back_or(&headers, "/courses")))
}

async fn google_handler(cookies: Cookies, State(state): State<AppState>) -> WebResult<Redirect> {
    let Some(provider) = state.oauth() else {
        flash::error(&cookies, "Google sign-in is not available.");
        return Ok(Redirect::to("/auth/login"));
    };

    let oauth_state = auth::generate_state_token();
    let url = provider
        .authorize_url(&oauth_state)
        .map_err(WebError::server_external_error)?;
    session::set_oauth_state(&cookies, oauth_state);
    Ok(Redirect::to(&url))
}

/// Any failure ends on the login page with a flash message.
#[tracing::instrument(skip_all)]
async fn google_callback_handler(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    match google_sign_in(&cookies, &state, query).await {
        Ok(redirect) => redirect,
        Err(e) => {
            log_error(&e);
            flash::error(&cookies, "Google sign-in failed. Please try again.");
            Redirect::to("/auth/login")
        }
    }
}

async fn google_sign_in(
    cookies: &Cookies,
    state: &AppState,
    query: OAuthCallbackQuery,
) -> WebResult<Redirect> {
    let returned = query.state.unwrap_or_default();
    if !session::check_oauth_state(cookies, &returned) {
        return Err(WebError::auth_state_mismatch());
    }
    if let Some(error) = query.error {
        tracing::warn!("provider refused sign-in: {error}");
        return Err(WebError::auth_invalid_credentials());
    }
    let code = query.code.ok_or(WebError::auth_invalid_credentials())?;
    let provider = state.oauth().ok_or(WebError::auth_invalid_credentials())?;

    let profile = provider
        .fetch_profile(&code)
        .await
        .map_err(WebError::server_external_error)?;

    let admin = AuthenticatedUser::admin();
    let existing = UserEntity::find_by_email(state.pool(), &admin, &profile.email)
        .await
        .map_err(fetch_error)?;

    let user = match existing {
        Some(user) => user,
        None => create_oauth_user(state, &profile).await?,
    };

    session::start_session(cookies, state.jwt_secret(), user.id())?;
    Ok(landing_for(&user))
}

/// Verified account named after the profile; the password hash is a non-PHC
/// placeholder so password sign-in never succeeds for it.
async fn create_oauth_user(
    state: &AppState,
    profile: &crate::external::OAuthProfile,
) -> WebResult<UserEntity> {
    let admin = AuthenticatedUser::admin();
    let mut last_error = None;

    for _ in 0..5 {
        let suffix = rand::rng().random_range(0..1000u16);
        let data = UserEntityCreateUpdate {
            username: username_from_profile(profile, suffix),
            email: profile.email.clone(),
            password_hash: format!("oauth:{}", auth::generate_state_token()),
            role: UserRole::User.to_string(),
            is_verified: true,
        };

        match UserEntity::create(state.pool(), &admin, data).await {
            Ok(user) => {
                tracing::info!("created {} through Google sign-in", user.username());
                return Ok(user);
            }
            Err(e) if e.is_unique_violation() => last_error = Some(e),
            Err(e) => return Err(fetch_error(e)),
        }
    }

    Err(match last_error {
        Some(e) => fetch_error(e),
        None => WebError::registration_conflict(),
    })
}

async fn logout_handler(cookies: Cookies) -> Redirect {
    session::end_session(&cookies);
    Redirect::to("/")
}
