use axum::{
    Form, Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    auth::{hash_password, verify_password},
    model::{
        CrudRepository, ResourceTyped,
        entity::{CourseModule, Enrollment, UserEntity, notification::KIND_SECURITY},
        notify::notify,
        progress,
    },
    web::{
        ApiResult, AppState, AuthenticatedUser, ErrorResponse, RequestContext, WebError,
        WebResult,
        dto::ModuleCompletionResponse,
        flash,
        routes::{
            field,
            home::{faq_handler, profile_handler},
            parse_id, secret,
        },
        views::{self, CourseProgressView, Layout, SettingsPage},
    },
};

const MIN_PASSWORD_LEN: usize = 6;
const SETTINGS_PAGE: &str = "/user/settings";

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/faq", get(faq_handler))
        .route("/settings", get(settings_handler))
        .route("/settings/update", post(update_profile_handler))
        .route("/settings/password", post(change_password_handler))
        .route("/course/module/{id}/quiz", post(module_quiz_handler))
        .route("/{handle}", get(profile_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

async fn dashboard_handler(ctx: RequestContext) -> WebResult<Redirect> {
    ctx.user()?;
    Ok(Redirect::to("/"))
}

async fn load_self(state: &AppState, user: &AuthenticatedUser) -> WebResult<UserEntity> {
    UserEntity::find_by_id(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or(WebError::auth_required())
}

#[tracing::instrument(skip_all)]
async fn settings_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let entity = load_self(&state, user).await?;
    let courses = Enrollment::list_for_user(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    let page = SettingsPage {
        layout: Layout::build(&state, &ctx, &cookies, "Account Settings").await,
        username: entity.username().to_string(),
        email: entity.email().to_string(),
        courses: courses.into_iter().map(CourseProgressView::from).collect(),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all)]
async fn update_profile_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> WebResult<Redirect> {
    let user = ctx.user()?;
    let (Some(username), Some(email)) = (field(&form.username), field(&form.email)) else {
        flash::error(&cookies, "Username and email are required.");
        return Ok(Redirect::to(SETTINGS_PAGE));
    };

    let conflict = UserEntity::find_conflict(
        state.pool(),
        user,
        username,
        email,
        Some(user.user_id()),
    )
    .await
    .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;
    if conflict.is_some() {
        flash::error(&cookies, "Username or Email already taken.");
        return Ok(Redirect::to(SETTINGS_PAGE));
    }

    let mut entity = load_self(&state, user).await?;
    match entity.set_profile(state.pool(), username, email).await {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() => {
            flash::error(&cookies, "Username or Email already taken.");
            return Ok(Redirect::to(SETTINGS_PAGE));
        }
        Err(e) => return Err(WebError::resource_fetch_error(UserEntity::get_resource_type(), e)),
    }

    notify(
        state.pool(),
        user.user_id(),
        KIND_SECURITY,
        "Profile Updated",
        "Your account details were changed.",
    )
    .await;

    flash::success(&cookies, "Profile updated successfully!");
    Ok(Redirect::to(SETTINGS_PAGE))
}

/// Error message for an invalid password change, before the current password is checked.
fn password_change_problem(form: &PasswordForm) -> Option<&'static str> {
    let (Some(_), Some(new), Some(confirm)) = (
        secret(&form.current_password),
        secret(&form.new_password),
        secret(&form.confirm_password),
    ) else {
        return Some("All password fields are required.");
    };
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Some("New password must be at least 6 characters.");
    }
    if new != confirm {
        return Some("New passwords do not match.");
    }
    None
}

#[tracing::instrument(skip_all)]
async fn change_password_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> WebResult<Redirect> {
    let user = ctx.user()?;
    if let Some(problem) = password_change_problem(&form) {
        flash::error(&cookies, problem);
        return Ok(Redirect::to(SETTINGS_PAGE));
    }
    let current = secret(&form.current_password).unwrap_or_default();
    let new = secret(&form.new_password).unwrap_or_default();

    let mut entity = load_self(&state, user).await?;
    let matches =
        verify_password(entity.hash(), current).map_err(WebError::server_crypt_error)?;
    if !matches {
        flash::error(&cookies, "Current password is incorrect.");
        return Ok(Redirect::to(SETTINGS_PAGE));
    }

    let hash = hash_password(new).map_err(WebError::server_crypt_error)?;
    entity
        .set_password_hash(state.pool(), hash)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    notify(
        state.pool(),
        user.user_id(),
        KIND_SECURITY,
        "Security Protocol Change",
        "Your password was changed. If this wasn't you, contact support.",
    )
    .await;
    tracing::info!("{} changed their password", user.username());

    flash::success(&cookies, "Password changed successfully!");
    Ok(Redirect::to(SETTINGS_PAGE))
}

#[utoipa::path(
    post,
    path = "/user/course/module/{id}/quiz",
    params(("id" = uuid::Uuid, Path, description = "Module id")),
    description = "Marks a module as completed for the current user and applies XP, level and streak updates",
    responses(
        (status = 200, description = "Completion recorded", body = ModuleCompletionResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("cookie" = [])),
    tag = "progress"
)]
#[tracing::instrument(skip_all, fields(module = %id))]
pub(crate) async fn module_quiz_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ModuleCompletionResponse>> {
    let user = ctx.user()?;
    let id = parse_id(&id, CourseModule::get_resource_type())?;
    let module = CourseModule::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(CourseModule::get_resource_type(), e))?
        .ok_or(WebError::resource_not_found(CourseModule::get_resource_type()))?;

    let mut entity = load_self(&state, user).await?;
    let outcome = progress::complete_module(state.pool(), &mut entity, &module, None, Utc::now())
        .await
        .map_err(|e| WebError::resource_fetch_error(CourseModule::get_resource_type(), e))?;

    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn form(current: &str, new: &str, confirm: &str) -> PasswordForm {
        PasswordForm {
            current_password: Some(current.to_string()),
            new_password: Some(new.to_string()),
            confirm_password: Some(confirm.to_string()),
        }
    }

    #[test]
    fn password_change_validation() {
        assert_eq!(
            password_change_problem(&form("", "secret1", "secret1")),
            Some("All password fields are required.")
        );
        assert_eq!(
            password_change_problem(&form("old", "abc", "abc")),
            Some("New password must be at least 6 characters.")
        );
        assert_eq!(
            password_change_problem(&form("old", "secret1", "secret2")),
            Some("New passwords do not match.")
        );
        assert_eq!(password_change_problem(&form("old", "secret1", "secret1")), None);
        assert_eq!(password_change_problem(&form(" ", "  pad  ", "  pad  ")), None);
    }
}
