use async_trait::async_trait;
use link_core::{AuthorizationCode, Client, OAuth2Error, Token, User};
use link_ports::{ClientStore, Storage, TokenStore, UserStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Postgres, Sqlite};
use std::borrow::Cow;
use std::path::PathBuf;

#[derive(Clone, Debug)]
enum DatabasePool {
    Sqlite(Pool<Sqlite>),
    Postgres(Pool<Postgres>),
}

/// Run `$body` against whichever pool is configured.
///
/// Queries are written with `?` placeholders; `$sql` rewrites them to `$n`
/// for Postgres.
macro_rules! on_pool {
    ($storage:expr, |$pool:ident, $sql:ident| $body:expr) => {
        match &$storage.pool {
            DatabasePool::Sqlite($pool) => {
                let $sql = sqlite_sql;
                $body
            }
            DatabasePool::Postgres($pool) => {
                let $sql = postgres_sql;
                $body
            }
        }
    };
}

const INSERT_CLIENT: &str = r#"
    INSERT INTO clients (client_id, client_secret, domain, created_at)
    VALUES (?, ?, ?, ?)
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (id, uid, email, password_hash, qq_id, lark_id, github_id, wechat_id, created_at, is_deleted)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_TOKEN: &str = r#"
    INSERT INTO tokens (id, access_token, refresh_token, token_type, expires_in, scope, client_id, user_id, created_at, expires_at, refresh_expires_at, revoked)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_AUTHORIZATION_CODE: &str = r#"
    INSERT INTO authorization_codes (id, code, client_id, user_id, redirect_uri, scope, created_at, expires_at, used, code_challenge, code_challenge_method)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// SQL-backed storage implementation (SQLite/Postgres) using SQLx.
pub struct SqlxStorage {
    pool: DatabasePool,
}

impl SqlxStorage {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = if database_url.starts_with("postgres") {
            DatabasePool::Postgres(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await?,
            )
        } else if is_sqlite_memory(database_url) {
            // Every connection to `:memory:` opens a fresh database, so pin the pool to one
            // connection that never gets recycled.
            DatabasePool::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect(database_url)
                    .await?,
            )
        } else {
            if let Some(path) = sqlite_db_path(database_url) {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                }
                if !path.as_os_str().is_empty() && !path.exists() {
                    let _ = std::fs::File::create(&path);
                }
            }

            let connect_url = sqlite_url_with_create_mode(database_url);
            DatabasePool::Sqlite(Pool::<Sqlite>::connect(connect_url.as_ref()).await?)
        };

        Ok(Self { pool })
    }

    async fn init_sqlx(&self) -> Result<(), sqlx::Error> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
            DatabasePool::Postgres(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
        }
        tracing::debug!("database schema bootstrapped");
        Ok(())
    }
}

#[async_trait]
impl Storage for SqlxStorage {
    async fn init(&self) -> Result<(), OAuth2Error> {
        self.init_sqlx().await.map_err(Into::into)
    }

    async fn healthcheck(&self) -> Result<(), OAuth2Error> {
        on_pool!(self, |pool, _sql| {
            sqlx::query("SELECT 1").execute(pool).await?;
        });
        Ok(())
    }
}

#[async_trait]
impl ClientStore for SqlxStorage {
    async fn save_client(&self, client: &Client) -> Result<(), OAuth2Error> {
        on_pool!(self, |pool, sql| {
            sqlx::query(&sql(INSERT_CLIENT))
                .bind(&client.client_id)
                .bind(&client.client_secret)
                .bind(&client.domain)
                .bind(client.created_at)
                .execute(pool)
                .await?;
        });
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, OAuth2Error> {
        let client = on_pool!(self, |pool, sql| {
            sqlx::query_as::<_, Client>(&sql(
                "SELECT client_id, client_secret, domain, created_at FROM clients WHERE client_id = ?",
            ))
            .bind(client_id)
            .fetch_optional(pool)
            .await?
        });
        Ok(client)
    }
}

#[async_trait]
impl UserStore for SqlxStorage {
    async fn save_user(&self, user: &User) -> Result<(), OAuth2Error> {
        on_pool!(self, |pool, sql| {
            sqlx::query(&sql(INSERT_USER))
                .bind(&user.id)
                .bind(&user.uid)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.qq_id)
                .bind(&user.lark_id)
                .bind(&user.github_id)
                .bind(&user.wechat_id)
                .bind(user.created_at)
                .bind(user.is_deleted)
                .execute(pool)
                .await?;
        });
        Ok(())
    }

    async fn get_user_by_uid(&self, uid: &str) -> Result<Option<User>, OAuth2Error> {
        let user = on_pool!(self, |pool, sql| {
            sqlx::query_as::<_, User>(&sql("SELECT * FROM users WHERE uid = ? AND is_deleted = ?"))
                .bind(uid)
                .bind(false)
                .fetch_optional(pool)
                .await?
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, OAuth2Error> {
        let user = on_pool!(self, |pool, sql| {
            sqlx::query_as::<_, User>(&sql(
                "SELECT * FROM users WHERE email = ? AND is_deleted = ?",
            ))
            .bind(email)
            .bind(false)
            .fetch_optional(pool)
            .await?
        });
        Ok(user)
    }
}

#[async_trait]
impl TokenStore for SqlxStorage {
    async fn save_token(&self, token: &Token) -> Result<(), OAuth2Error> {
        on_pool!(self, |pool, sql| {
            sqlx::query(&sql(INSERT_TOKEN))
                .bind(&token.id)
                .bind(&token.access_token)
                .bind(&token.refresh_token)
                .bind(&token.token_type)
                .bind(token.expires_in)
                .bind(&token.scope)
                .bind(&token.client_id)
                .bind(&token.user_id)
                .bind(token.created_at)
                .bind(token.expires_at)
                .bind(token.refresh_expires_at)
                .bind(token.revoked)
                .execute(pool)
                .await?;
        });
        Ok(())
    }

    async fn get_token_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Token>, OAuth2Error> {
        let token = on_pool!(self, |pool, sql| {
            sqlx::query_as::<_, Token>(&sql("SELECT * FROM tokens WHERE access_token = ?"))
                .bind(access_token)
                .fetch_optional(pool)
                .await?
        });
        Ok(token)
    }

    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Token>, OAuth2Error> {
        let token = on_pool!(self, |pool, sql| {
            sqlx::query_as::<_, Token>(&sql("SELECT * FROM tokens WHERE refresh_token = ?"))
                .bind(refresh_token)
                .fetch_optional(pool)
                .await?
        });
        Ok(token)
    }

    async fn revoke_token(&self, token: &str) -> Result<(), OAuth2Error> {
        on_pool!(self, |pool, sql| {
            sqlx::query(&sql(
                "UPDATE tokens SET revoked = ? WHERE access_token = ? OR refresh_token = ?",
            ))
            .bind(true)
            .bind(token)
            .bind(token)
            .execute(pool)
            .await?;
        });
        Ok(())
    }

    async fn consume_refresh_token(&self, refresh_token: &str) -> Result<bool, OAuth2Error> {
        let affected = on_pool!(self, |pool, sql| {
            sqlx::query(&sql(
                "UPDATE tokens SET revoked = ? WHERE refresh_token = ? AND revoked = ?",
            ))
            .bind(true)
            .bind(refresh_token)
            .bind(false)
            .execute(pool)
            .await?
            .rows_affected()
        });
        Ok(affected == 1)
    }

    async fn save_authorization_code(
        &self,
        auth_code: &AuthorizationCode,
    ) -> Result<(), OAuth2Error> {
        on_pool!(self, |pool, sql| {
            sqlx::query(&sql(INSERT_AUTHORIZATION_CODE))
                .bind(&auth_code.id)
                .bind(&auth_code.code)
                .bind(&auth_code.client_id)
                .bind(&auth_code.user_id)
                .bind(&auth_code.redirect_uri)
                .bind(&auth_code.scope)
                .bind(auth_code.created_at)
                .bind(auth_code.expires_at)
                .bind(auth_code.used)
                .bind(&auth_code.code_challenge)
                .bind(&auth_code.code_challenge_method)
                .execute(pool)
                .await?;
        });
        Ok(())
    }

    async fn get_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, OAuth2Error> {
        let auth_code = on_pool!(self, |pool, sql| {
            sqlx::query_as::<_, AuthorizationCode>(&sql(
                "SELECT * FROM authorization_codes WHERE code = ?",
            ))
            .bind(code)
            .fetch_optional(pool)
            .await?
        });
        Ok(auth_code)
    }

    async fn mark_authorization_code_used(&self, code: &str) -> Result<bool, OAuth2Error> {
        let affected = on_pool!(self, |pool, sql| {
            sqlx::query(&sql(
                "UPDATE authorization_codes SET used = ? WHERE code = ? AND used = ?",
            ))
            .bind(true)
            .bind(code)
            .bind(false)
            .execute(pool)
            .await?
            .rows_affected()
        });
        Ok(affected == 1)
    }
}

const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        client_id TEXT PRIMARY KEY,
        client_secret TEXT NOT NULL,
        domain TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        uid TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        qq_id TEXT,
        lark_id TEXT,
        github_id TEXT,
        wechat_id TEXT,
        created_at TEXT NOT NULL,
        is_deleted INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokens (
        id TEXT PRIMARY KEY,
        access_token TEXT NOT NULL UNIQUE,
        refresh_token TEXT UNIQUE,
        token_type TEXT NOT NULL,
        expires_in INTEGER NOT NULL,
        scope TEXT NOT NULL,
        client_id TEXT NOT NULL,
        user_id TEXT,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        refresh_expires_at TEXT,
        revoked INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (client_id) REFERENCES clients(client_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tokens_client_id ON tokens(client_id)",
    "CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON tokens(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS authorization_codes (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        client_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        redirect_uri TEXT NOT NULL,
        scope TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        used INTEGER NOT NULL DEFAULT 0,
        code_challenge TEXT,
        code_challenge_method TEXT,
        FOREIGN KEY (client_id) REFERENCES clients(client_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_authorization_codes_client_id ON authorization_codes(client_id)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        client_id TEXT PRIMARY KEY,
        client_secret TEXT NOT NULL,
        domain TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        uid TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        qq_id TEXT,
        lark_id TEXT,
        github_id TEXT,
        wechat_id TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokens (
        id TEXT PRIMARY KEY,
        access_token TEXT NOT NULL UNIQUE,
        refresh_token TEXT UNIQUE,
        token_type TEXT NOT NULL,
        expires_in BIGINT NOT NULL,
        scope TEXT NOT NULL,
        client_id TEXT NOT NULL REFERENCES clients(client_id),
        user_id TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        refresh_expires_at TIMESTAMPTZ,
        revoked BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tokens_client_id ON tokens(client_id)",
    "CREATE INDEX IF NOT EXISTS idx_tokens_user_id ON tokens(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS authorization_codes (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        client_id TEXT NOT NULL REFERENCES clients(client_id),
        user_id TEXT NOT NULL,
        redirect_uri TEXT NOT NULL,
        scope TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        used BOOLEAN NOT NULL DEFAULT FALSE,
        code_challenge TEXT,
        code_challenge_method TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_authorization_codes_client_id ON authorization_codes(client_id)",
];

fn sqlite_sql(query: &'static str) -> Cow<'static, str> {
    Cow::Borrowed(query)
}

/// Rewrite `?` placeholders into Postgres' numbered `$1, $2, ...` form.
fn postgres_sql(query: &'static str) -> Cow<'static, str> {
    let mut out = String::with_capacity(query.len() + 8);
    let mut n = 0;
    for ch in query.chars() {
        if ch == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

fn is_sqlite_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn sqlite_db_path(database_url: &str) -> Option<PathBuf> {
    if !database_url.starts_with("sqlite:") || is_sqlite_memory(database_url) {
        return None;
    }

    let mut rest = &database_url["sqlite:".len()..];
    if rest.starts_with("///") {
        rest = &rest[2..];
    } else if rest.starts_with("//") {
        rest = &rest[1..];
    }

    let path_part = rest.split('?').next().unwrap_or(rest);
    if path_part.is_empty() {
        return None;
    }

    Some(PathBuf::from(path_part))
}

fn sqlite_url_with_create_mode(database_url: &str) -> Cow<'_, str> {
    if !database_url.starts_with("sqlite:")
        || is_sqlite_memory(database_url)
        || database_url.contains("mode=")
    {
        return Cow::Borrowed(database_url);
    }

    let sep = if database_url.contains('?') { '&' } else { '?' };
    Cow::Owned(format!("{database_url}{sep}mode=rwc"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_placeholders_are_numbered_in_order() {
        assert_eq!(
            postgres_sql("UPDATE t SET a = ? WHERE b = ? AND c = ?"),
            "UPDATE t SET a = $1 WHERE b = $2 AND c = $3"
        );
        assert_eq!(sqlite_sql("SELECT ?"), "SELECT ?");
    }

    #[test]
    fn sqlite_paths_are_extracted_from_urls() {
        assert_eq!(
            sqlite_db_path("sqlite:data/link.db?mode=rwc"),
            Some(PathBuf::from("data/link.db"))
        );
        assert_eq!(
            sqlite_db_path("sqlite:///var/lib/link.db"),
            Some(PathBuf::from("/var/lib/link.db"))
        );
        assert_eq!(sqlite_db_path("sqlite::memory:"), None);
        assert_eq!(sqlite_db_path("postgres://localhost/link"), None);
    }

    #[test]
    fn create_mode_is_added_only_when_missing() {
        assert_eq!(
            sqlite_url_with_create_mode("sqlite:link.db"),
            "sqlite:link.db?mode=rwc"
        );
        assert_eq!(
            sqlite_url_with_create_mode("sqlite:link.db?cache=shared"),
            "sqlite:link.db?cache=shared&mode=rwc"
        );
        assert_eq!(
            sqlite_url_with_create_mode("sqlite:link.db?mode=ro"),
            "sqlite:link.db?mode=ro"
        );
        assert_eq!(sqlite_url_with_create_mode("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn in_memory_database_keeps_its_schema_between_calls() {
        let storage = SqlxStorage::new("sqlite::memory:").await.unwrap();
        storage.init().await.unwrap();
        storage
            .save_client(&Client::new("c1".into(), "s1".into(), "example.com".into()))
            .await
            .unwrap();

        let client = storage.get_client("c1").await.unwrap().unwrap();
        assert_eq!(client.domain, "example.com");
        storage.healthcheck().await.unwrap();
    }
}
