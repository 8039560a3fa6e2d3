//! Outgoing mail

use async_trait::async_trait;
use tracing::info;

use crate::error::AccountsResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
    /// `None` leaves the choice of sender to the mailer
    pub from: Option<String>,
    pub to: Vec<String>,
}

/// Delivers mail. Delivery failures are returned to the caller untouched.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> AccountsResult<()>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone)]
pub struct LogMailer {
    default_from: String,
}

impl LogMailer {
    pub fn new(default_from: impl Into<String>) -> Self {
        Self {
            default_from: default_from.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> AccountsResult<()> {
        let from = message.from.as_deref().unwrap_or(&self.default_from);
        info!(
            from,
            to = ?message.to,
            subject = %message.subject,
            "Mail not delivered, logging only"
        );
        Ok(())
    }
}
