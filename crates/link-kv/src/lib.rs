//! [`EphemeralStore`](link_ports::EphemeralStore) adapters.
//!
//! Redis is used in deployments; the in-memory store backs single-node
//! development setups and tests.

mod memory;
mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use link_core::OAuth2Error;
use link_ports::DynEphemeralStore;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Pick a backend: Redis when a URL is configured, otherwise in-process memory.
pub async fn create_ephemeral_store(
    redis_url: Option<&str>,
) -> Result<DynEphemeralStore, OAuth2Error> {
    match redis_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("ephemeral store: redis");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "ephemeral store: in-memory (no redis url configured; state is lost on restart)"
            );
            let store = MemoryStore::new();
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    let removed = sweeper.purge_expired().await;
                    if removed > 0 {
                        tracing::debug!(removed, "purged expired ephemeral entries");
                    }
                }
            });
            Ok(Arc::new(store))
        }
    }
}
