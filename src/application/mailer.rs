//! Outbound mail seam.
//!
//! Delivery is fire-and-forget everywhere in the application: callers log
//! failures at warn level and never fail the surrounding request.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Default transport: records the delivery in the log stream. Production
/// deployments swap in an SMTP-backed implementation at the same seam.
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(
            target = "immob::mail",
            from = %self.from_address,
            to = %to,
            subject = %subject,
            body_bytes = body.len(),
            "outbound mail"
        );
        Ok(())
    }
}
