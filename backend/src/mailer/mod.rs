//! Outbound e-mail
//!
//! Delivery is fire-and-forget: [`dispatch`] spawns the send and only logs
//! the outcome, so callers never observe delivery failures.

use crate::config::MailConfig;
use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Subject line of the password-reset e-mail
pub const RESET_PASSWORD_SUBJECT: &str = "Forgot Password";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// SendGrid v3 `mail/send` client
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
    from: String,
}

impl SendGridMailer {
    pub fn new(api_key: SecretString, url: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            url: url.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/html", "value": html }]
        });

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_body = resp.text().await.unwrap_or_default();
            anyhow::bail!("SendGrid API error: {status}: {error_body}");
        }

        Ok(())
    }
}

/// Logs the envelope instead of delivering; used when no API key is set
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<()> {
        info!(to = %to, subject = %subject, "E-mail delivery disabled, message dropped");
        Ok(())
    }
}

/// Pick the mailer for the configuration
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.sendgrid_api_key {
        Some(key) if !key.trim().is_empty() => Arc::new(SendGridMailer::new(
            SecretString::new(key.clone()),
            config.sendgrid_url.clone(),
            config.from_address.clone(),
        )),
        _ => {
            warn!("No SendGrid API key configured, e-mails will only be logged");
            Arc::new(LogMailer)
        }
    }
}

/// Send in the background; failures are logged and swallowed
pub fn dispatch(mailer: Arc<dyn Mailer>, to: String, subject: &str, html: String) {
    let subject = subject.to_string();
    tokio::spawn(async move {
        match mailer.send(&to, &subject, &html).await {
            Ok(()) => info!(subject = %subject, "E-mail dispatched"),
            Err(e) => warn!(subject = %subject, error = %e, "E-mail dispatch failed"),
        }
    });
}

/// HTML body of the password-reset e-mail
///
/// The link points at the front-end, which posts the token back to
/// `server_uri`.
pub fn reset_password_email(token: &str, platform_uri: &str, server_uri: &str) -> String {
    let platform = platform_uri.trim_end_matches('/');
    let link = format!("{}/reset?token={}", platform, token);
    format!(
        r#"<!DOCTYPE html>
<html>
  <body>
    <h2>Forgot your password?</h2>
    <p>We received a request to reset the password of your account.</p>
    <p><a href="{link}">Choose a new password</a></p>
    <p>If the link does not work, open {platform} and use this token:</p>
    <pre>{token}</pre>
    <p>The request will be handled by {server}. If you did not ask for a reset, ignore this e-mail.</p>
  </body>
</html>
"#,
        link = link,
        platform = platform,
        token = token,
        server = server_uri.trim_end_matches('/'),
    )
}
