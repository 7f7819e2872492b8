mod context;
pub use context::{AuthenticatedUser, RequestContext, UserRole};

mod error;
pub use error::{
    ApiError, ApiResult, ErrorResponse, FORBIDDEN_MESSAGE, NOT_FOUND_MESSAGE, WebError, WebResult,
};

pub mod flash;
pub mod middlewares;
pub mod session;

mod state;
pub use state::{AppState, Services};

pub mod dto;
pub mod routes;
pub mod views;

pub mod doc;
