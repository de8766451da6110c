use async_trait::async_trait;
use tracing::{field, Instrument};

use link_core::{AuthorizationCode, Client, OAuth2Error, Token, User};
use link_ports::{ClientStore, DynStorage, Storage, TokenStore, UserStore};

use crate::telemetry::annotate_span_with_trace_ids;

/// Build a `db` span carrying the backend name, operation and any extra fields.
macro_rules! db_span {
    ($self:ident, $op:literal $(, $($fields:tt)+)?) => {{
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %$self.db_system,
            db_operation = $op
            $(, $($fields)+)?
        );
        annotate_span_with_trace_ids(&span);
        span
    }};
}

/// Wraps a storage backend and opens a tracing span for every call.
///
/// Request spans created by the actix middleware thus extend through the
/// actors down into persistence calls.
pub struct ObservedStorage {
    inner: DynStorage,
    db_system: String,
}

impl ObservedStorage {
    pub fn new(inner: DynStorage, db_system: impl Into<String>) -> Self {
        Self {
            inner,
            db_system: db_system.into(),
        }
    }

    pub fn db_system(&self) -> &str {
        &self.db_system
    }
}

/// Secrets are never logged in full.
fn prefix(secret: &str) -> String {
    secret.chars().take(12).collect()
}

#[async_trait]
impl ClientStore for ObservedStorage {
    async fn save_client(&self, client: &Client) -> Result<(), OAuth2Error> {
        let span = db_span!(self, "save_client", client_id = %client.client_id);
        self.inner.save_client(client).instrument(span).await
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, OAuth2Error> {
        let span = db_span!(self, "get_client", client_id = %client_id);
        self.inner.get_client(client_id).instrument(span).await
    }
}

#[async_trait]
impl UserStore for ObservedStorage {
    async fn save_user(&self, user: &User) -> Result<(), OAuth2Error> {
        let span = db_span!(self, "save_user", uid = %user.uid);
        self.inner.save_user(user).instrument(span).await
    }

    async fn get_user_by_uid(&self, uid: &str) -> Result<Option<User>, OAuth2Error> {
        let span = db_span!(self, "get_user_by_uid", uid = %uid);
        self.inner.get_user_by_uid(uid).instrument(span).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, OAuth2Error> {
        let span = db_span!(self, "get_user_by_email");
        self.inner.get_user_by_email(email).instrument(span).await
    }
}

#[async_trait]
impl TokenStore for ObservedStorage {
    async fn save_token(&self, token: &Token) -> Result<(), OAuth2Error> {
        let span = db_span!(
            self,
            "save_token",
            token_prefix = %prefix(&token.access_token),
            client_id = %token.client_id,
            user_id = %token.user_id.as_deref().unwrap_or(""),
            revoked = token.revoked
        );
        self.inner.save_token(token).instrument(span).await
    }

    async fn get_token_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Token>, OAuth2Error> {
        let span = db_span!(
            self,
            "get_token_by_access_token",
            token_prefix = %prefix(access_token),
            token_len = access_token.len()
        );
        self.inner
            .get_token_by_access_token(access_token)
            .instrument(span)
            .await
    }

    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<Token>, OAuth2Error> {
        let span = db_span!(
            self,
            "get_token_by_refresh_token",
            token_prefix = %prefix(refresh_token),
            token_len = refresh_token.len()
        );
        self.inner
            .get_token_by_refresh_token(refresh_token)
            .instrument(span)
            .await
    }

    async fn revoke_token(&self, token: &str) -> Result<(), OAuth2Error> {
        let span = db_span!(self, "revoke_token", token_prefix = %prefix(token));
        self.inner.revoke_token(token).instrument(span).await
    }

    async fn consume_refresh_token(&self, refresh_token: &str) -> Result<bool, OAuth2Error> {
        let span = db_span!(
            self,
            "consume_refresh_token",
            token_prefix = %prefix(refresh_token),
            consumed = field::Empty
        );
        let consumed = self
            .inner
            .consume_refresh_token(refresh_token)
            .instrument(span.clone())
            .await?;
        span.record("consumed", consumed);
        Ok(consumed)
    }

    async fn save_authorization_code(
        &self,
        auth_code: &AuthorizationCode,
    ) -> Result<(), OAuth2Error> {
        let span = db_span!(
            self,
            "save_authorization_code",
            client_id = %auth_code.client_id,
            user_id = %auth_code.user_id
        );
        self.inner
            .save_authorization_code(auth_code)
            .instrument(span)
            .await
    }

    async fn get_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, OAuth2Error> {
        let span = db_span!(
            self,
            "get_authorization_code",
            code_prefix = %prefix(code),
            code_len = code.len()
        );
        self.inner.get_authorization_code(code).instrument(span).await
    }

    async fn mark_authorization_code_used(&self, code: &str) -> Result<bool, OAuth2Error> {
        let span = db_span!(
            self,
            "mark_authorization_code_used",
            code_prefix = %prefix(code),
            consumed = field::Empty
        );
        let consumed = self
            .inner
            .mark_authorization_code_used(code)
            .instrument(span.clone())
            .await?;
        span.record("consumed", consumed);
        Ok(consumed)
    }
}

#[async_trait]
impl Storage for ObservedStorage {
    async fn init(&self) -> Result<(), OAuth2Error> {
        let span = db_span!(self, "init");
        self.inner.init().instrument(span).await
    }

    async fn healthcheck(&self) -> Result<(), OAuth2Error> {
        let span = db_span!(self, "healthcheck");
        self.inner.healthcheck().instrument(span).await
    }
}
