use axum::{
    Router,
    extract::Request,
    http::{HeaderMap, header::REFERER},
    middleware,
    response::IntoResponse,
};
use serde::Deserialize;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    model::ResourceType,
    utils::client_ip::client_ip,
    web::{AppState, RequestContext, WebError, WebResult, doc::ApiDoc, middlewares},
};
use uuid::Uuid;

pub mod admin;
pub mod auth;
pub mod courses;
pub mod home;
pub mod notifications;
pub mod user;

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl PaginationQuery {
    /// Limit within 1..=200, non-negative offset.
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.offset.max(0))
    }
}

pub fn build_app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(home::routes(state.clone()))
        .nest("/auth", auth::routes(state.clone()))
        .nest("/user", user::routes(state.clone()))
        .nest("/courses", courses::routes(state.clone()))
        .nest("/admin", admin::routes(state.clone()))
        .nest("/api/notifications", notifications::routes(state.clone()))
        .nest_service("/public", ServeDir::new("public"))
        .fallback(not_found_handler);

    if state.config().app().docs() {
        router = router
            .merge(SwaggerUi::new("/api/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .layer(CookieManagerLayer::default())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

async fn not_found_handler(req: Request) -> impl IntoResponse {
    tracing::debug!("no route for {}", req.uri());
    WebError::resource_not_found(ResourceType::Page)
}

/// Country the catalog is restricted to: the stored country, else the geolocated
/// client address. `None` lists everything.
pub(crate) async fn viewer_country(
    state: &AppState,
    ctx: &RequestContext,
    headers: &HeaderMap,
) -> Option<String> {
    if let Some(user) = ctx.maybe_user() {
        if user.view_global_always() {
            return None;
        }
        if let Some(country) = user.country() {
            return Some(country.to_uppercase());
        }
    }

    let ip = client_ip(headers)?;
    state.geo().country_for(&ip).await
}

/// Same-site Referer path, or `fallback`.
pub(crate) fn back_or(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| match url::Url::parse(raw) {
            Ok(url) => Some(match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            }),
            Err(_) if raw.starts_with('/') && !raw.starts_with("//") => Some(raw.to_string()),
            Err(_) => None,
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Path ids that are not UUIDs name nothing that exists.
pub(crate) fn parse_id(raw: &str, r#type: ResourceType) -> WebResult<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|_| WebError::resource_not_found(r#type))
}

/// Trims form input, treating blank as missing.
pub(crate) fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Like [`field`] but untrimmed: passwords are taken exactly as typed.
pub(crate) fn secret(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn referer_is_reduced_to_a_path() {
        let mut headers = HeaderMap::new();
        assert_eq!(back_or(&headers, "/courses"), "/courses");

        headers.insert(
            REFERER,
            HeaderValue::from_static("http://localhost:5000/courses?subject=Stars"),
        );
        assert_eq!(back_or(&headers, "/"), "/courses?subject=Stars");

        headers.insert(REFERER, HeaderValue::from_static("//evil.example"));
        assert_eq!(back_or(&headers, "/"), "/");
    }

    #[test]
    fn pagination_is_clamped() {
        let q = PaginationQuery {
            limit: 10_000,
            offset: -5,
        };
        assert_eq!(q.clamped(), (200, 0));
    }

    #[test]
    fn malformed_ids_are_not_found() {
        let err = parse_id("not-a-uuid", ResourceType::Course).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        assert!(parse_id(&Uuid::new_v4().to_string(), ResourceType::Course).is_ok());
    }

    #[test]
    fn blank_fields_are_missing() {
        assert_eq!(field(&Some(String::from("  "))), None);
        assert_eq!(field(&Some(String::from(" a "))), Some("a"));
        assert_eq!(field(&None), None);
    }

    #[test]
    fn secrets_keep_their_spaces() {
        assert_eq!(secret(&Some(String::from(" a "))), Some(" a "));
        assert_eq!(secret(&Some(String::new())), None);
    }
}
