mod admin;
pub use admin::require_admin;

mod auth;
pub use auth::extract_context_fn;
