//! Transactional mail over the SendGrid v3 API.
//!
//! Without an API key configured, sending degrades to a log line so local
//! development and tests never need network access.

use serde::Serialize;

use crate::config::MailConfig;
use crate::error::{AppError, AppResult};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
pub struct MailerService {
    client: reqwest::Client,
    config: MailConfig,
    frontend_url: String,
}

#[derive(Serialize)]
struct MailAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<MailAddress<'a>>,
}

#[derive(Serialize)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: MailAddress<'a>,
    subject: &'a str,
    content: Vec<MailContent<'a>>,
}

impl MailerService {
    pub fn new(config: MailConfig, frontend_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            frontend_url,
        }
    }

    /// Send the forgot-password e-mail carrying the reset link.
    pub async fn send_reset_email(&self, to: &str, username: &str, token: &str) -> AppResult<()> {
        let link = format!(
            "{}/changepassword?token={}",
            self.frontend_url.trim_end_matches('/'),
            token
        );
        let html = format!(
            "<p>Hello {username},</p>\
             <p>A password reset was requested for your account. \
             Follow <a href=\"{link}\">this link</a> to choose a new password.</p>\
             <p>If you did not request this, you can ignore this e-mail.</p>"
        );

        self.send(to, "Reset your password", html).await
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> AppResult<()> {
        let Some(api_key) = self.config.sendgrid_api_key.as_deref() else {
            tracing::info!("Mailer not configured; skipping e-mail to {}", to);
            return Ok(());
        };

        let body = SendRequest {
            personalizations: vec![Personalization {
                to: vec![MailAddress { email: to }],
            }],
            from: MailAddress {
                email: &self.config.from_address,
            },
            subject,
            content: vec![MailContent {
                content_type: "text/html",
                value: html,
            }],
        };

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("mail request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(anyhow::anyhow!(
                "mail provider returned {}: {}",
                status,
                detail
            )));
        }

        tracing::info!("Message sent to {}", to);
        Ok(())
    }
}
