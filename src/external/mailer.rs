//! Outgoing e-mail. Production sends through the Brevo transactional API; without an
//! API key codes are only logged, and tests record them in memory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::error::{ExternalError, ExternalResult};
use crate::config::Mail;

const BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
const OTP_SUBJECT: &str = "Verify Your AstroDataHub Account";

#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Sends a verification code to `email`.
    async fn send_otp(&self, email: &str, otp: &str) -> ExternalResult<()>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Picks the Brevo mailer when an API key is configured, the logging one otherwise.
pub fn from_config(mail: &Mail) -> ExternalResult<Arc<dyn Mailer>> {
    if mail.api_key().is_empty() {
        tracing::warn!("no mail api key configured, verification codes will only be logged");
        return Ok(Arc::new(LogMailer));
    }
    Ok(Arc::new(BrevoMailer::new(mail)?))
}

fn otp_html(otp: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; background-color: #0f172a; color: #ffffff; padding: 40px; text-align: center;">
  <div style="max-width: 500px; margin: auto; background-color: #1e293b; padding: 20px; border-radius: 15px; border: 1px solid #334155;">
    <h1 style="color: #38bdf8; margin-bottom: 20px;">AstroDataHub</h1>
    <p style="font-size: 16px;">Your security authorization code is:</p>
    <div style="font-size: 42px; font-weight: bold; color: #38bdf8; letter-spacing: 12px; margin: 30px 0; padding: 20px; background: #0f172a; border-radius: 10px; border: 1px solid #38bdf8;">{otp}</div>
    <p style="font-size: 13px; color: #94a3b8;">The code expires in {ttl} minutes.</p>
  </div>
</div>"#,
        ttl = crate::auth::OTP_TTL_MINUTES,
    )
}

#[derive(Debug)]
pub struct BrevoMailer {
    api_key: String,
    sender_email: String,
    sender_name: String,
    endpoint: String,
    http_client: reqwest::Client,
}

impl BrevoMailer {
    pub fn new(mail: &Mail) -> ExternalResult<Self> {
        Self::with_endpoint(mail, BREVO_API_URL)
    }

    pub fn with_endpoint(mail: &Mail, endpoint: impl Into<String>) -> ExternalResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_key: mail.api_key().to_string(),
            sender_email: mail.sender_email().to_string(),
            sender_name: mail.sender_name().to_string(),
            endpoint: endpoint.into(),
            http_client,
        })
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    #[tracing::instrument(skip(self, otp))]
    async fn send_otp(&self, email: &str, otp: &str) -> ExternalResult<()> {
        let body = json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [{ "email": email }],
            "subject": OTP_SUBJECT,
            "htmlContent": otp_html(otp),
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExternalError::from_response(self.name(), response).await);
        }

        tracing::info!("verification email sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "brevo"
    }
}

#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, email: &str, otp: &str) -> ExternalResult<()> {
        tracing::info!("verification code for {email}: {otp}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every sent code; optionally fails every send.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Latest code sent to `email`.
    pub fn last_otp_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        sent.iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, otp)| otp.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_otp(&self, email: &str, otp: &str) -> ExternalResult<()> {
        if self.failing {
            return Err(ExternalError::NotConfigured("memory mailer"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((email.to_string(), otp.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn memory_mailer_keeps_latest_code() {
        let mailer = MemoryMailer::new();
        mailer.send_otp("a@orbit.test", "111111").await.unwrap();
        mailer.send_otp("b@orbit.test", "222222").await.unwrap();
        mailer.send_otp("a@orbit.test", "333333").await.unwrap();

        assert_eq!(mailer.last_otp_for("a@orbit.test").as_deref(), Some("333333"));
        assert_eq!(mailer.sent_count(), 3);
        assert!(mailer.last_otp_for("c@orbit.test").is_none());
    }

    #[tokio::test]
    async fn failing_mailer_errors() {
        assert!(MemoryMailer::failing().send_otp("a@orbit.test", "1").await.is_err());
    }

    #[test]
    fn email_body_carries_code() {
        assert!(otp_html("482913").contains("482913"));
    }
}
