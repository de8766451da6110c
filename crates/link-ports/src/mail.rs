use async_trait::async_trait;
use std::sync::Arc;

use link_core::{OAuth2Error, OutgoingEmail};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), OAuth2Error>;
}

pub type DynMailer = Arc<dyn Mailer>;
