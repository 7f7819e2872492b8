use askama::Template;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::{
    auth::CryptError,
    error::log_error,
    external::ExternalError,
    model::{DatabaseError, ResourceType},
    web::{
        flash,
        views::{ErrorPage, Layout},
    },
};

pub type WebResult<T> = std::result::Result<T, WebError>;

pub const NOT_FOUND_MESSAGE: &str = "The coordinates you entered do not exist in this sector.";
pub const LOGIN_REQUIRED_MESSAGE: &str = "You must be logged in to view this page.";
pub const FORBIDDEN_MESSAGE: &str =
    "Error 403: You do not have administrative privileges to access this area.";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("RegistrationUserConflict")]
    RegistrationUserConflict,
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("AuthenticationRequired")]
    AuthenticationRequired,

    #[error("AuthenticationInvalidCredentials")]
    AuthenticationInvalidCredentials,

    #[error("AuthenticationStateMismatch")]
    AuthenticationStateMismatch,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("ResourceNotFound: {resource_type:?}")]
    ResourceNotFound { resource_type: ResourceType },

    #[error("ResourceForbidden: {resource_type:?}")]
    ResourceForbidden { resource_type: ResourceType },

    #[error("ResourceFetchError: {resource_type:?}. Error: {error}")]
    ResourceFetchError {
        resource_type: ResourceType,
        error: DatabaseError,
    },
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("ServerCryptError: {0}")]
    ServerCryptError(#[from] crate::auth::CryptError),

    #[error("ServerTemplateError: {0}")]
    ServerTemplateError(#[from] askama::Error),

    #[error("ServerExternalError: {0}")]
    ServerExternalError(#[from] ExternalError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServerExternalError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ServerExternalError(_) => {
                String::from("A relay station did not answer. Please try again later.")
            }
            _ => String::from("Internal server error."),
        }
    }
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RegistrationUserConflict => StatusCode::CONFLICT,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::RegistrationUserConflict => String::from("Username or Email already registered."),
        }
    }
}

impl AuthenticationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AuthenticationInvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AuthenticationStateMismatch => StatusCode::BAD_REQUEST,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::AuthenticationRequired => String::from("Authentication required."),
            Self::AuthenticationInvalidCredentials => {
                String::from("Invalid Identity or Access Key.")
            }
            Self::AuthenticationStateMismatch => {
                String::from("Sign-in request expired, please try again.")
            }
        }
    }
}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ResourceForbidden { .. } => StatusCode::FORBIDDEN,
            Self::ResourceFetchError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceNotFound {
                resource_type: ResourceType::User,
            } => String::from("Explorer not found in this sector."),
            Self::ResourceNotFound { .. } => String::from(NOT_FOUND_MESSAGE),
            Self::ResourceForbidden { .. } => String::from(FORBIDDEN_MESSAGE),
            Self::ResourceFetchError { .. } => {
                String::from("Our archives are unreachable right now. Please try again.")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("ResourceError - {0}")]
    ResourceError(#[from] ResourceError),
    #[error("AuthenticationError - {0}")]
    AuthenticationError(#[from] AuthenticationError),
    #[error("RegistrationError - {0}")]
    RegistrationError(#[from] RegistrationError),
    #[error("ServerError - {0}")]
    ServerError(#[from] ServerError),
}

impl WebError {
    pub fn resource_not_found(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceNotFound {
            resource_type: r#type,
        })
    }

    pub fn resource_forbidden(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceForbidden {
            resource_type: r#type,
        })
    }

    pub fn resource_fetch_error(r#type: ResourceType, error: DatabaseError) -> Self {
        Self::ResourceError(ResourceError::ResourceFetchError {
            resource_type: r#type,
            error,
        })
    }

    pub fn auth_required() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationRequired)
    }

    pub fn auth_invalid_credentials() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationInvalidCredentials)
    }

    pub fn auth_state_mismatch() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationStateMismatch)
    }

    pub fn registration_conflict() -> Self {
        Self::RegistrationError(RegistrationError::RegistrationUserConflict)
    }

    pub fn server_crypt_error(e: CryptError) -> Self {
        Self::ServerError(ServerError::ServerCryptError(e))
    }

    pub fn server_template_error(e: askama::Error) -> Self {
        Self::ServerError(ServerError::ServerTemplateError(e))
    }

    pub fn server_external_error(e: ExternalError) -> Self {
        Self::ServerError(ServerError::ServerExternalError(e))
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            Self::ResourceError(e) => e.status_code(),
            Self::RegistrationError(e) => e.status_code(),
            Self::AuthenticationError(e) => e.status_code(),
            Self::ServerError(e) => e.status_code(),
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceError(e) => e.client_display(),
            Self::RegistrationError(e) => e.client_display(),
            Self::AuthenticationError(e) => e.client_display(),
            Self::ServerError(e) => e.client_display(),
        }
    }

    fn is_auth_required(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationError(AuthenticationError::AuthenticationRequired)
        )
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message for the client
    pub message: String,
    /// HTTP status code (stringified)
    pub status_code: String,
    /// Optional debug details (only in debug mode)
    pub details: Option<String>,
}

impl ErrorResponse {
    fn from_error(error: &WebError) -> Self {
        Self {
            message: error.client_display(),
            status_code: error.status_code().as_str().to_string(),
            details: if cfg!(debug_assertions) {
                Some(error.to_string())
            } else {
                None
            },
        }
    }
}

/// Pages: anonymous visitors of protected pages go to the login screen,
/// everything else renders the error page with the matching status.
impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if self.is_auth_required() {
            let mut response = Redirect::to("/auth/login").into_response();
            if let Some(value) = flash::error_header(LOGIN_REQUIRED_MESSAGE)
                .and_then(|v| HeaderValue::from_str(&v).ok())
            {
                response.headers_mut().append(SET_COOKIE, value);
            }
            return response;
        }
        log_error(&self);

        let status_code = self.status_code();
        let page = ErrorPage {
            layout: Layout::anonymous(&format!("Error {}", status_code.as_u16())),
            status: status_code.as_u16(),
            message: self.client_display(),
            details: ErrorResponse::from_error(&self).details.unwrap_or_default(),
        };

        match page.render() {
            Ok(html) => (status_code, Html(html)).into_response(),
            Err(e) => {
                log_error(&e);
                (status_code, page.message).into_response()
            }
        }
    }
}

/// JSON flavour of [`WebError`] for the `/api` endpoints.
#[derive(Debug)]
pub struct ApiError(pub WebError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<WebError> for ApiError {
    fn from(value: WebError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.0.status_code();
        if status_code.is_server_error() {
            log_error(&self.0);
        }
        (status_code, Json(ErrorResponse::from_error(&self.0))).into_response()
    }
}
