//! Storage backend selection for SAST Link.
//!
//! Picks the SQLx backend from the database URL and wraps it with
//! `ObservedStorage` for tracing.

use std::sync::Arc;

use link_core::OAuth2Error;

pub use link_observability::ObservedStorage;
pub use link_ports::{ClientStore, DynStorage, Storage, TokenStore, UserStore};
pub use link_storage_sqlx::SqlxStorage;

/// `db.system` value for a database URL.
pub fn db_system(database_url: &str) -> &'static str {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        "postgresql"
    } else if database_url.starts_with("sqlite:") {
        "sqlite"
    } else {
        "sql"
    }
}

/// Connect to the database named by `database_url` (`sqlite:...` or `postgres://...`).
///
/// The concrete wrapper is returned so callers can hand it out as each of the
/// narrower store traits.
pub async fn create_storage(database_url: &str) -> Result<Arc<ObservedStorage>, OAuth2Error> {
    let system = db_system(database_url);
    if system == "sql" {
        return Err(OAuth2Error::server_error(format!(
            "unsupported database url scheme (expected sqlite: or postgres://): {}",
            database_url.split(':').next().unwrap_or_default()
        )));
    }

    let storage = SqlxStorage::new(database_url).await?;
    let inner: DynStorage = Arc::new(storage);
    Ok(Arc::new(ObservedStorage::new(inner, system)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_system_follows_the_url_scheme() {
        assert_eq!(db_system("sqlite::memory:"), "sqlite");
        assert_eq!(db_system("postgres://u:p@h/db"), "postgresql");
        assert_eq!(db_system("postgresql://h/db"), "postgresql");
        assert_eq!(db_system("mysql://h/db"), "sql");
    }
}
