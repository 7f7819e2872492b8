mod password;
pub use password::{hash_password, verify_password};
mod jwt;
pub use jwt::{UserClaims, VerifyClaims, generate_token, process_token};
mod token;
pub use token::{generate_otp, generate_token as generate_state_token};
mod error;
pub use error::{CryptError, CryptResult};

/// Lifetime of a one-time password.
pub const OTP_TTL_MINUTES: i64 = 15;

/// Lifetime of a session cookie.
pub const SESSION_TTL_HOURS: i64 = 24;
