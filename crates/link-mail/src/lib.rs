//! Outgoing mail for the account flow.

mod log_mailer;
mod smtp;
pub mod template;

use std::sync::Arc;

use link_config::EmailConfig;
use link_core::OAuth2Error;
use link_ports::DynMailer;

pub use log_mailer::LogMailer;
pub use smtp::SmtpMailer;
pub use template::verification_email;

/// SMTP when enabled in config, otherwise a mailer that only logs.
pub fn create_mailer(config: &EmailConfig) -> Result<DynMailer, OAuth2Error> {
    if config.enabled {
        let mailer = SmtpMailer::new(config)?;
        tracing::info!(smtp_host = %config.smtp_host, smtp_port = config.smtp_port, "mailer: smtp");
        Ok(Arc::new(mailer))
    } else {
        tracing::warn!("mailer: log only (email.enabled = false)");
        Ok(Arc::new(LogMailer))
    }
}
