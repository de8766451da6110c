use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use link_core::OAuth2Error;

/// Short-lived string values with a time-to-live (tickets, codes, login tokens).
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), OAuth2Error>;
    /// `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, OAuth2Error>;
    async fn delete(&self, key: &str) -> Result<(), OAuth2Error>;
}

pub type DynEphemeralStore = Arc<dyn EphemeralStore>;
