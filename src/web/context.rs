//! Request context, e.g. user id, its role, etc.
//!

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    model::entity::UserEntity,
    web::{WebResult, error::WebError},
};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    user_id: uuid::Uuid,
    user_role: UserRole,
    username: String,
    country: Option<String>,
    view_global_always: bool,
}

impl AuthenticatedUser {
    pub fn new(user_id: uuid::Uuid, user_role: UserRole) -> Self {
        Self {
            user_id,
            user_role,
            username: String::new(),
            country: None,
            view_global_always: false,
        }
    }

    pub fn from_entity(user: &UserEntity) -> Self {
        Self {
            user_id: user.id(),
            user_role: user.role(),
            username: user.username().to_string(),
            country: user.country().map(str::to_string),
            view_global_always: user.view_global_always(),
        }
    }

    /// Internal actor for system operations (seeding, background notifications).
    pub fn admin() -> Self {
        Self::new(uuid::Uuid::max(), UserRole::Admin)
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.user_id
    }

    pub fn user_role(&self) -> UserRole {
        self.user_role.clone()
    }

    pub fn is_admin(&self) -> bool {
        self.user_role == UserRole::Admin
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn view_global_always(&self) -> bool {
        self.view_global_always
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    /// Strict parse for admin input; unknown roles are rejected instead of defaulting.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl From<&str> for UserRole {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    maybe_user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn new(maybe_user: Option<AuthenticatedUser>) -> Self {
        Self { maybe_user }
    }

    pub fn maybe_user(&self) -> Option<&AuthenticatedUser> {
        self.maybe_user.as_ref()
    }

    pub fn user(&self) -> WebResult<&AuthenticatedUser> {
        self.maybe_user.as_ref().ok_or(WebError::auth_required())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<RequestContext>();
        if let Some(ctx) = ctx {
            Ok(ctx.clone())
        } else {
            Ok(RequestContext::new(None))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(UserRole::from("admin"), UserRole::Admin);
        assert_eq!(UserRole::from("anything"), UserRole::User);
        assert_eq!(UserRole::parse("root"), None);
        assert_eq!(UserRole::parse("user"), Some(UserRole::User));
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn anonymous_context_requires_login() {
        let ctx = RequestContext::new(None);
        assert!(ctx.maybe_user().is_none());
        assert!(ctx.user().is_err());
    }
}
