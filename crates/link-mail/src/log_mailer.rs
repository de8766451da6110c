use async_trait::async_trait;

use link_core::{OAuth2Error, OutgoingEmail};
use link_ports::Mailer;

/// Development mailer: writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), OAuth2Error> {
        tracing::info!(to = %email.to, subject = %email.subject, "mail not sent (log mailer)");
        tracing::debug!(body = %email.text_body, "log mailer body");
        Ok(())
    }
}
