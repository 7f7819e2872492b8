use axum::{extract::Request, middleware::Next, response::Response};

use crate::{
    model::ResourceType,
    web::{RequestContext, WebError},
};

/// Anonymous visitors are sent to the login page, signed-in non-admins get a 403.
pub async fn require_admin(ctx: RequestContext, req: Request, next: Next) -> Result<Response, WebError> {
    let user = ctx.user()?;
    if !user.is_admin() {
        return Err(WebError::resource_forbidden(ResourceType::User));
    }
    Ok(next.run(req).await)
}
