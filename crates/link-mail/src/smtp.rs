use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use link_config::EmailConfig;
use link_core::{OAuth2Error, OutgoingEmail};
use link_ports::Mailer;

const SMTPS_PORT: u16 = 465;

/// SMTP delivery through a pooled lettre transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, OAuth2Error> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|e| OAuth2Error::server_error(format!("invalid sender address: {e}")))?;

        // 465 speaks TLS from the first byte, anything else upgrades with STARTTLS.
        let relay = if config.smtp_port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        };
        let builder =
            relay.map_err(|e| OAuth2Error::server_error(format!("smtp relay: {e}")))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.secret.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), OAuth2Error> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| OAuth2Error::invalid_request("invalid recipient address"))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(
                email.text_body,
                email.html_body,
            ))
            .map_err(|e| OAuth2Error::server_error(format!("build message: {e}")))?;

        self.transport.send(message).await.map_err(|e| {
            tracing::error!(error = %e, "smtp send failed");
            OAuth2Error::server_error(format!("smtp send: {e}"))
        })?;

        tracing::info!(to = %email.to, "verification mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 465,
            sender: "noreply@example.com".to_string(),
            secret: "pw".to_string(),
            subject: "code".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_without_connecting() {
        assert!(SmtpMailer::new(&config()).is_ok());

        let mut starttls = config();
        starttls.smtp_port = 587;
        assert!(SmtpMailer::new(&starttls).is_ok());
    }

    #[tokio::test]
    async fn rejects_a_malformed_sender() {
        let mut bad = config();
        bad.sender = "not an address".to_string();
        let err = SmtpMailer::new(&bad).err().unwrap();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn rejects_a_malformed_recipient_before_sending() {
        let mailer = SmtpMailer::new(&config()).unwrap();
        let err = mailer
            .send(OutgoingEmail {
                to: "nobody".to_string(),
                subject: "s".to_string(),
                text_body: "t".to_string(),
                html_body: "<p>t</p>".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_request");
    }
}
