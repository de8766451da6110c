#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use sast_link::config::{
    AccountConfig, Config, DatabaseConfig, EmailConfig, JwtConfig, OAuthConfig, RedisConfig,
    ServerConfig, SessionConfig,
};
use sast_link::domain::{AuthorizationCode, Client, OAuth2Error, OutgoingEmail, Token, User};
use sast_link::observability::{Metrics, ObservedStorage};
use sast_link::ports::{Mailer, Storage, UserStore};
use sast_link::Services;

pub const JWT_SECRET: &str = "integration-test-secret-integration-test-secret";

/// Mailer that keeps every message for inspection.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Six-digit code from the most recent message to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .and_then(|mail| {
                mail.text_body
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|part| part.len() == 6)
                    .map(str::to_string)
            })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), OAuth2Error> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        redis: RedisConfig::default(),
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            login_token_ttl_secs: 3600,
        },
        oauth: OAuthConfig::default(),
        account: AccountConfig::default(),
        email: EmailConfig::default(),
        session: SessionConfig::default(),
    }
}

/// A fully wired service over a temporary SQLite database and in-memory KV.
pub struct TestEnv {
    pub services: Services,
    pub storage: Arc<ObservedStorage>,
    pub mailer: Arc<RecordingMailer>,
    _dir: tempfile::TempDir,
}

/// Must run inside an actix system (`#[actix_rt::test]`).
pub async fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("link.db").display());

    let storage = sast_link::storage::create_storage(&url).await.unwrap();
    storage.init().await.unwrap();

    let kv: sast_link::ports::DynEphemeralStore = Arc::new(sast_link::kv::MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());

    let services = Services::start(
        &test_config(),
        storage.clone(),
        kv,
        mailer.clone(),
        Metrics::new().unwrap(),
    );

    TestEnv {
        services,
        storage,
        mailer,
        _dir: dir,
    }
}

/// Build the app under test with a cookie session, as the server does.
#[macro_export]
macro_rules! test_app {
    ($env:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(
                    actix_session::SessionMiddleware::builder(
                        actix_session::storage::CookieSessionStore::default(),
                        actix_web::cookie::Key::generate(),
                    )
                    .cookie_secure(false)
                    .build(),
                )
                .configure(|cfg| $env.services.register(cfg)),
        )
        .await
    };
}

/// Persist a user with an Argon2 hash of `password`.
pub async fn seed_user(storage: &ObservedStorage, email: &str, password: &str) -> User {
    let uid = User::uid_from_email(email).unwrap();
    let hash = sast_link::http::password::hash_password(password).unwrap();
    let user = User::new(uid, email.to_string(), hash);
    storage.save_user(&user).await.unwrap();
    user
}

fn other(msg: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(msg.to_string())
}

/// Behaviour every `Storage` backend must share.
pub async fn run_storage_contract(storage: &dyn Storage) -> Result<(), Box<dyn std::error::Error>> {
    // Clients
    let client = Client::new(
        "client_1".to_string(),
        "secret_1".to_string(),
        "https://app.example.com".to_string(),
    );
    storage.save_client(&client).await.map_err(other)?;

    let fetched = storage
        .get_client("client_1")
        .await
        .map_err(other)?
        .ok_or_else(|| other("client should exist"))?;
    assert_eq!(fetched.client_secret, "secret_1");
    assert_eq!(fetched.domain, "https://app.example.com");
    assert!(storage.get_client("missing").await.map_err(other)?.is_none());

    let dup = storage.save_client(&client).await;
    assert!(dup.is_err(), "saving the same client_id twice should fail");

    // Users
    let user = User::new(
        "b21010101".to_string(),
        "b21010101@njupt.edu.cn".to_string(),
        "hash".to_string(),
    );
    storage.save_user(&user).await.map_err(other)?;

    let by_uid = storage
        .get_user_by_uid("b21010101")
        .await
        .map_err(other)?
        .ok_or_else(|| other("user should exist by uid"))?;
    assert_eq!(by_uid.email, user.email);
    let by_email = storage
        .get_user_by_email("b21010101@njupt.edu.cn")
        .await
        .map_err(other)?
        .ok_or_else(|| other("user should exist by email"))?;
    assert_eq!(by_email.uid, "b21010101");

    let mut deleted = User::new(
        "gone".to_string(),
        "gone@njupt.edu.cn".to_string(),
        "hash".to_string(),
    );
    deleted.is_deleted = true;
    storage.save_user(&deleted).await.map_err(other)?;
    assert!(
        storage.get_user_by_uid("gone").await.map_err(other)?.is_none(),
        "soft-deleted users are invisible"
    );

    let clash = User::new(
        "b21010101".to_string(),
        "other@njupt.edu.cn".to_string(),
        "hash".to_string(),
    );
    assert!(storage.save_user(&clash).await.is_err(), "uid must be unique");

    // Tokens, revocation and refresh rotation
    let token = Token::new(
        "access_1".to_string(),
        Some("refresh_1".to_string()),
        client.client_id.clone(),
        Some(user.uid.clone()),
        "all".to_string(),
        3600,
    )
    .with_refresh_expiry(Utc::now() + Duration::days(3));
    storage.save_token(&token).await.map_err(other)?;

    let fetched = storage
        .get_token_by_access_token("access_1")
        .await
        .map_err(other)?
        .ok_or_else(|| other("token should exist"))?;
    assert!(fetched.is_valid());
    assert!(fetched.is_refreshable());
    assert_eq!(fetched.user_id.as_deref(), Some("b21010101"));

    assert!(storage.consume_refresh_token("refresh_1").await.map_err(other)?);
    assert!(
        !storage.consume_refresh_token("refresh_1").await.map_err(other)?,
        "a refresh token can only be consumed once"
    );
    let consumed = storage
        .get_token_by_refresh_token("refresh_1")
        .await
        .map_err(other)?
        .ok_or_else(|| other("consumed token is kept"))?;
    assert!(consumed.revoked);

    let second = Token::new(
        "access_2".to_string(),
        None,
        client.client_id.clone(),
        None,
        "all".to_string(),
        3600,
    );
    storage.save_token(&second).await.map_err(other)?;
    storage.revoke_token("access_2").await.map_err(other)?;
    let revoked = storage
        .get_token_by_access_token("access_2")
        .await
        .map_err(other)?
        .ok_or_else(|| other("revoked token is kept"))?;
    assert!(!revoked.is_valid());

    // Authorization codes
    let code = AuthorizationCode::new(
        "code_1".to_string(),
        client.client_id.clone(),
        user.uid.clone(),
        "https://app.example.com/cb".to_string(),
        "all".to_string(),
        Some("challenge".to_string()),
        Some("plain".to_string()),
        600,
    );
    storage.save_authorization_code(&code).await.map_err(other)?;

    let fetched = storage
        .get_authorization_code("code_1")
        .await
        .map_err(other)?
        .ok_or_else(|| other("code should exist"))?;
    assert!(fetched.is_valid());
    assert_eq!(fetched.code_challenge.as_deref(), Some("challenge"));

    assert!(storage.mark_authorization_code_used("code_1").await.map_err(other)?);
    assert!(
        !storage.mark_authorization_code_used("code_1").await.map_err(other)?,
        "a code can only be used once"
    );
    let used = storage
        .get_authorization_code("code_1")
        .await
        .map_err(other)?
        .ok_or_else(|| other("used code is kept"))?;
    assert!(used.used);

    storage.healthcheck().await.map_err(other)?;
    Ok(())
}
