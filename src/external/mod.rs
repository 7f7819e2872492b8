//! Third-party services behind traits, so the app and its tests can swap them.

mod error;
pub use error::{ExternalError, ExternalResult};

pub mod geo;
pub use geo::{GeoLocator, IpApiLocator, StaticLocator};

pub mod mailer;
pub use mailer::{BrevoMailer, LogMailer, Mailer, MemoryMailer};

pub mod oauth;
pub use oauth::{GoogleOAuth, OAuthProfile, OAuthProvider, StaticOAuth};
