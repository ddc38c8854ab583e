use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::{MailProvider, SendOutcome};

pub struct SendgridMailer {
    api_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl SendgridMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MailProvider for SendgridMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<SendOutcome> {
        // Dev mode: no API key configured, log the mail instead of sending.
        if self.api_key.is_empty() {
            tracing::info!(to = %to, subject = %subject, "mail (dev mode, not sent): {body}");
            return Ok(SendOutcome {
                message_id: format!("dev-{}", Uuid::new_v4()),
            });
        }

        let payload = serde_json::json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to reach mail API")?
            .error_for_status()
            .context("mail API returned error")?;

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("sg-{}", Uuid::new_v4()));

        Ok(SendOutcome { message_id })
    }
}
