//! Outbound mail client
//!
//! Talks to a transactional email provider over its HTTP JSON API with a
//! bearer key. When email is disabled in config every send is a logged no-op
//! so the rest of the system behaves identically in development.

use crate::config::EmailConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    html: &'a str,
}

pub struct Mailer {
    config: EmailConfig,
    client: reqwest::Client,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build mail HTTP client")?;
        Ok(Self { config, client })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Deliver one message. Disabled provider short-circuits to Ok.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.config.enabled {
            tracing::info!(to, subject, "Email disabled, skipping send");
            return Ok(());
        }

        let request = SendRequest {
            from: Address {
                email: &self.config.from_email,
                name: Some(&self.config.from_name),
            },
            to: vec![Address {
                email: to,
                name: None,
            }],
            subject,
            html: body,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Email provider request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Email provider returned {}: {}", status, text);
        }

        tracing::debug!(to, "Email accepted by provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server_url: &str, enabled: bool) -> EmailConfig {
        EmailConfig {
            enabled,
            api_url: format!("{}/v1/send", server_url),
            api_key: "test-key".into(),
            from_email: "couple@example.com".into(),
            from_name: "The Couple".into(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_bearer_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/send"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "from": {"email": "couple@example.com", "name": "The Couple"},
                "to": [{"email": "guest@example.com"}],
                "subject": "Hello",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = Mailer::new(config(&server.uri(), true)).unwrap();
        mailer
            .send("guest@example.com", "Hello", "<p>Hi</p>")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/send"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad address"))
            .mount(&server)
            .await;

        let mailer = Mailer::new(config(&server.uri(), true)).unwrap();
        let err = mailer
            .send("guest@example.com", "Hello", "body")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("422"));
    }

    #[tokio::test]
    async fn test_disabled_never_calls_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mailer = Mailer::new(config(&server.uri(), false)).unwrap();
        mailer
            .send("guest@example.com", "Hello", "body")
            .await
            .unwrap();
    }
}
