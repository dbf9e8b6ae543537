//! Outbound transactional email
//!
//! Handlers never send inline; they queue a send through `BackgroundTasks`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn welcome(to: &str, user_id: i64, activation_token: &str, expiry: DateTime<Utc>) -> Self {
        Self {
            to: to.to_string(),
            subject: "Welcome to Marketier!".to_string(),
            body: format!(
                "Hi,\n\nThanks for signing up. Your user ID number is {}.\n\n\
                 Please send a PUT request to /v1/users/activated with the following JSON body \
                 to activate your account:\n\n{{\"token\": \"{}\"}}\n\n\
                 This token is valid until {}.\n",
                user_id,
                activation_token,
                expiry.to_rfc2822()
            ),
        }
    }

    pub fn activation(to: &str, activation_token: &str, expiry: DateTime<Utc>) -> Self {
        Self {
            to: to.to_string(),
            subject: "Activate your Marketier account".to_string(),
            body: format!(
                "Hi,\n\nPlease send a PUT request to /v1/users/activated with the following JSON body \
                 to activate your account:\n\n{{\"token\": \"{}\"}}\n\n\
                 This token is valid until {}.\n",
                activation_token,
                expiry.to_rfc2822()
            ),
        }
    }

    pub fn password_reset(to: &str, reset_token: &str, expiry: DateTime<Utc>) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your Marketier password".to_string(),
            body: format!(
                "Hi,\n\nPlease send a PUT request to /v1/users/password with the following JSON body \
                 to set a new password:\n\n{{\"password\": \"your new password\", \"token\": \"{}\"}}\n\n\
                 This token is valid until {}.\n",
                reset_token,
                expiry.to_rfc2822()
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Development sender: logs instead of delivering.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "email send stub\n{}", email.body);
        Ok(())
    }
}

/// JSON-over-HTTPS transactional mail API authenticated with a bearer key
#[derive(Clone, Debug)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let body = json!({
            "from": self.sender,
            "to": [email.to],
            "subject": email.subject,
            "text": email.body,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("mail API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("mail API returned {}: {}", status, detail);
        }

        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// `HttpMailer` when an API key is configured, otherwise `LogMailer`.
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    if config.api_key.is_empty() {
        info!("No mail API key configured; emails will be logged");
        Arc::new(LogMailer)
    } else {
        Arc::new(HttpMailer::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_email_carries_token_and_id() {
        let expiry = Utc::now();
        let email = Email::welcome("ada@example.com", 17, "deadbeef", expiry);
        assert_eq!(email.to, "ada@example.com");
        assert!(email.body.contains("17"));
        assert!(email.body.contains("{\"token\": \"deadbeef\"}"));
    }

    #[test]
    fn reset_email_points_at_password_route() {
        let email = Email::password_reset("ada@example.com", "cafe", Utc::now());
        assert!(email.body.contains("/v1/users/password"));
        assert!(email.body.contains("cafe"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = Email::activation("ada@example.com", "cafe", Utc::now());
        assert!(LogMailer.send(&email).await.is_ok());
    }

    #[test]
    fn picks_sender_from_api_key() {
        let mut config = MailConfig {
            api_url: "https://mail.example.com/emails".to_string(),
            api_key: String::new(),
            sender: "Marketier <no-reply@example.com>".to_string(),
        };
        // Both construct without touching the network
        let _logger = from_config(&config);
        config.api_key = "key".to_string();
        let _http = from_config(&config);
    }
}
