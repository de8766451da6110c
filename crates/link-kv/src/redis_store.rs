use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use link_core::OAuth2Error;
use link_ports::EphemeralStore;

/// Redis-backed store. `ConnectionManager` reconnects on its own and is cheap to clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, OAuth2Error> {
        let client = redis::Client::open(url)
            .map_err(|e| OAuth2Error::server_error(format!("redis client: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| OAuth2Error::server_error(format!("redis connect: {e}")))?;
        Ok(Self { conn })
    }
}

fn redis_error(op: &'static str, err: redis::RedisError) -> OAuth2Error {
    tracing::error!(operation = op, error = %err, "redis command failed");
    OAuth2Error::server_error(format!("redis {op}: {err}"))
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), OAuth2Error> {
        let mut conn = self.conn.clone();
        // PX keeps sub-second TTLs; a zero TTL would be rejected by the server.
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| redis_error("SET", e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, OAuth2Error> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| redis_error("GET", e))
    }

    async fn delete(&self, key: &str) -> Result<(), OAuth2Error> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| redis_error("DEL", e))
    }
}
