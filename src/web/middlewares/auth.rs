use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    auth::{self, UserClaims},
    model::{CrudRepository, ResourceTyped, entity::UserEntity},
    web::{
        AppState, RequestContext, WebError,
        context::AuthenticatedUser,
        session::{self, AUTH_TOKEN},
    },
};

/// Resolves the session cookie to the current user row. Expired or forged tokens and
/// deleted accounts make the request anonymous and drop the cookie.
pub async fn extract_context_fn(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, WebError> {
    let Some(token) = cookies.get(AUTH_TOKEN) else {
        req.extensions_mut().insert(RequestContext::new(None));
        return Ok(next.run(req).await);
    };

    let user_id = auth::process_token::<UserClaims, _>(token.value(), state.jwt_secret())
        .ok()
        .and_then(|data| data.claims.sub.parse::<uuid::Uuid>().ok());

    let found = match user_id {
        Some(id) => UserEntity::find_by_id(state.pool(), &AuthenticatedUser::admin(), id)
            .await
            .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?,
        None => None,
    };

    let ctx = match found {
        Some(user) => RequestContext::new(Some(AuthenticatedUser::from_entity(&user))),
        None => {
            tracing::debug!("discarding stale session cookie");
            session::end_session(&cookies);
            RequestContext::new(None)
        }
    };

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
