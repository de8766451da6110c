use async_trait::async_trait;
use std::sync::Arc;

use link_core::{AuthorizationCode, Client, OAuth2Error, Token, User};

/// Persistence for registered OAuth clients.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn save_client(&self, client: &Client) -> Result<(), OAuth2Error>;
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, OAuth2Error>;
}

/// Persistence for issued tokens and authorization codes.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save_token(&self, token: &Token) -> Result<(), OAuth2Error>;
    async fn get_token_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Token>, OAuth2Error>;
    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Token>, OAuth2Error>;
    /// Revoke by access or refresh token value.
    async fn revoke_token(&self, token: &str) -> Result<(), OAuth2Error>;

    /// Atomically revoke the record owning `refresh_token`.
    ///
    /// Returns `false` when the record was already revoked or does not exist,
    /// so only one of several concurrent refreshes can win.
    async fn consume_refresh_token(&self, refresh_token: &str) -> Result<bool, OAuth2Error>;

    async fn save_authorization_code(
        &self,
        auth_code: &AuthorizationCode,
    ) -> Result<(), OAuth2Error>;
    async fn get_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, OAuth2Error>;

    /// Atomically flip `used` from false to true. Returns whether this call did it.
    async fn mark_authorization_code_used(&self, code: &str) -> Result<bool, OAuth2Error>;
}

/// Persistence for user accounts. Lookups never return soft-deleted rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn save_user(&self, user: &User) -> Result<(), OAuth2Error>;
    async fn get_user_by_uid(&self, uid: &str) -> Result<Option<User>, OAuth2Error>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, OAuth2Error>;
}

/// A full relational backend.
#[async_trait]
pub trait Storage: ClientStore + TokenStore + UserStore {
    /// Initialize the backing store (e.g., bootstrap schema).
    async fn init(&self) -> Result<(), OAuth2Error>;

    /// Lightweight liveness/readiness check.
    ///
    /// Implementations may override to do something cheaper than `init()`.
    async fn healthcheck(&self) -> Result<(), OAuth2Error> {
        self.init().await
    }
}

pub type DynStorage = Arc<dyn Storage>;
pub type DynClientStore = Arc<dyn ClientStore>;
pub type DynTokenStore = Arc<dyn TokenStore>;
pub type DynUserStore = Arc<dyn UserStore>;
