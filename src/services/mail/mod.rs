pub mod sendgrid;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: String,
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<SendOutcome>;
}
