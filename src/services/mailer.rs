use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Delivers one-time passcodes to their recipients.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send_otp(&self, email: &str, code: &str) -> Result<()>;
}

/// Writes passcodes to the log. Development only.
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send_otp(&self, email: &str, code: &str) -> Result<()> {
        tracing::info!("📧 OTP for {}: {}", email, code);
        Ok(())
    }
}

#[derive(Serialize)]
struct OtpPayload<'a> {
    email: &'a str,
    code: &'a str,
}

/// Posts `{email, code}` as JSON to a delivery webhook.
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
}

impl WebhookMailer {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl OtpMailer for WebhookMailer {
    async fn send_otp(&self, email: &str, code: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&OtpPayload { email, code })
            .send()
            .await
            .context("Failed to reach OTP webhook")?
            .error_for_status()
            .context("OTP webhook rejected the request")?;

        tracing::info!("📧 OTP sent to {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer.send_otp("ada@x.com", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_mailer_reports_unreachable_endpoint() {
        let mailer = WebhookMailer::new("http://127.0.0.1:9/otp".to_string());
        assert!(mailer.send_otp("ada@x.com", "123456").await.is_err());
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(OtpPayload {
            email: "ada@x.com",
            code: "000042",
        })
        .unwrap();
        assert_eq!(json["code"], "000042");
    }
}
