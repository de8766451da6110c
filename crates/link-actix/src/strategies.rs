//! Strategy implementations plugged into [`OAuthServer`](crate::OAuthServer).

use async_trait::async_trait;
use link_ports::{
    ClientInfoHandler, DynClientStore, DynTokenStore, SessionStore, UserAuthorization,
    UserAuthorizationHandler,
};

use link_core::{ClientCredentials, FormParams, OAuth2Error};

use crate::auth::LoginTokenVerifier;

/// Resolves client credentials from the request form.
///
/// A `refresh_token` grant names its client through the refresh token record,
/// so the stored client and secret are returned instead of form values.
pub struct FormClientInfoResolver {
    tokens: DynTokenStore,
    clients: DynClientStore,
}

impl FormClientInfoResolver {
    pub fn new(tokens: DynTokenStore, clients: DynClientStore) -> Self {
        Self { tokens, clients }
    }
}

#[async_trait]
impl ClientInfoHandler for FormClientInfoResolver {
    async fn client_info(&self, form: &FormParams) -> Result<ClientCredentials, OAuth2Error> {
        if form.get("grant_type") == Some("refresh_token") {
            let refresh_token = form
                .get_non_empty("refresh_token")
                .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

            let token = self
                .tokens
                .get_token_by_refresh_token(refresh_token)
                .await?
                .ok_or_else(|| OAuth2Error::invalid_grant("Refresh token not found"))?;
            if token.client_id.trim().is_empty() {
                return Err(OAuth2Error::invalid_client("Refresh token has no client"));
            }

            let client = self
                .clients
                .get_client(&token.client_id)
                .await?
                .ok_or_else(|| OAuth2Error::invalid_client("Client not found"))?;
            if client.client_secret.is_empty() {
                return Err(OAuth2Error::invalid_client("Client has no secret"));
            }

            return Ok(ClientCredentials {
                client_id: client.client_id,
                client_secret: client.client_secret,
            });
        }

        let client_id = form
            .get_non_empty("client_id")
            .ok_or_else(|| OAuth2Error::invalid_client("Missing client_id"))?;
        let client_secret = form
            .get_non_empty("client_secret")
            .ok_or_else(|| OAuth2Error::invalid_client("Missing client_secret"))?;

        Ok(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

/// Authenticates the resource owner from the `token` form field (a login token).
///
/// On any failure the request, minus the token, is saved to the session so it
/// can be replayed once the user has logged in.
pub struct LoginTokenAuthorizer {
    verifier: LoginTokenVerifier,
}

impl LoginTokenAuthorizer {
    pub fn new(verifier: LoginTokenVerifier) -> Self {
        Self { verifier }
    }
}

#[async_trait(?Send)]
impl UserAuthorizationHandler for LoginTokenAuthorizer {
    async fn authorize_user(
        &self,
        form: &FormParams,
        session: &dyn SessionStore,
    ) -> Result<UserAuthorization, OAuth2Error> {
        let uid = match form.get_non_empty("token") {
            Some(token) => self.verifier.verify(token).await,
            None => None,
        };

        if let Some(uid) = uid {
            return Ok(UserAuthorization::Granted(uid));
        }

        let mut saved = form.clone();
        saved.remove("token");
        session.set_return_form(&saved)?;
        tracing::debug!("authorization request parked until login");

        Ok(UserAuthorization::LoginRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use link_core::{keys, AccountClaims, AuthorizationCode, Client, Token, TokenPurpose};
    use link_kv::MemoryStore;
    use link_ports::{ClientStore, EphemeralStore, TokenStore};

    const SECRET: &str = "strategy-test-secret-strategy-test";

    #[derive(Default)]
    struct FakeStore {
        clients: Mutex<HashMap<String, Client>>,
        tokens: Mutex<Vec<Token>>,
    }

    #[async_trait]
    impl ClientStore for FakeStore {
        async fn save_client(&self, client: &Client) -> Result<(), OAuth2Error> {
            self.clients
                .lock()
                .unwrap()
                .insert(client.client_id.clone(), client.clone());
            Ok(())
        }

        async fn get_client(&self, client_id: &str) -> Result<Option<Client>, OAuth2Error> {
            Ok(self.clients.lock().unwrap().get(client_id).cloned())
        }
    }

    #[async_trait]
    impl TokenStore for FakeStore {
        async fn save_token(&self, token: &Token) -> Result<(), OAuth2Error> {
            self.tokens.lock().unwrap().push(token.clone());
            Ok(())
        }

        async fn get_token_by_access_token(&self, t: &str) -> Result<Option<Token>, OAuth2Error> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .find(|x| x.access_token == t)
                .cloned())
        }

        async fn get_token_by_refresh_token(&self, t: &str) -> Result<Option<Token>, OAuth2Error> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .find(|x| x.refresh_token.as_deref() == Some(t))
                .cloned())
        }

        async fn revoke_token(&self, _token: &str) -> Result<(), OAuth2Error> {
            Ok(())
        }

        async fn consume_refresh_token(&self, _t: &str) -> Result<bool, OAuth2Error> {
            Ok(true)
        }

        async fn save_authorization_code(&self, _c: &AuthorizationCode) -> Result<(), OAuth2Error> {
            Ok(())
        }

        async fn get_authorization_code(
            &self,
            _code: &str,
        ) -> Result<Option<AuthorizationCode>, OAuth2Error> {
            Ok(None)
        }

        async fn mark_authorization_code_used(&self, _code: &str) -> Result<bool, OAuth2Error> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct FakeSession(Mutex<Option<FormParams>>);

    impl SessionStore for FakeSession {
        fn get_return_form(&self) -> Result<Option<FormParams>, OAuth2Error> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn set_return_form(&self, form: &FormParams) -> Result<(), OAuth2Error> {
            *self.0.lock().unwrap() = Some(form.clone());
            Ok(())
        }

        fn remove_return_form(&self) {
            *self.0.lock().unwrap() = None;
        }
    }

    fn resolver(store: &Arc<FakeStore>) -> FormClientInfoResolver {
        FormClientInfoResolver::new(store.clone(), store.clone())
    }

    fn refresh_form(refresh_token: &str) -> FormParams {
        [("grant_type", "refresh_token"), ("refresh_token", refresh_token)]
            .into_iter()
            .collect()
    }

    async fn seed_refresh_token(store: &FakeStore, client_id: &str) {
        store
            .save_token(&Token::new(
                "access".into(),
                Some("refresh".into()),
                client_id.into(),
                Some("b21010101".into()),
                "all".into(),
                60,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn form_credentials_are_required() {
        let store = Arc::new(FakeStore::default());
        let form: FormParams = [("grant_type", "authorization_code"), ("client_id", "c")]
            .into_iter()
            .collect();
        let err = resolver(&store).client_info(&form).await.unwrap_err();
        assert_eq!(err.error, "invalid_client");

        let form: FormParams = [("client_id", "c"), ("client_secret", "s")]
            .into_iter()
            .collect();
        let creds = resolver(&store).client_info(&form).await.unwrap();
        assert_eq!(creds.client_id, "c");
        assert_eq!(creds.client_secret, "s");
    }

    #[tokio::test]
    async fn refresh_grant_fails_for_unknown_refresh_token() {
        let store = Arc::new(FakeStore::default());
        let err = resolver(&store)
            .client_info(&refresh_form("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[tokio::test]
    async fn refresh_grant_fails_for_empty_client_id() {
        let store = Arc::new(FakeStore::default());
        seed_refresh_token(&store, "").await;
        let err = resolver(&store)
            .client_info(&refresh_form("refresh"))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_client");
    }

    #[tokio::test]
    async fn refresh_grant_fails_for_empty_secret() {
        let store = Arc::new(FakeStore::default());
        seed_refresh_token(&store, "c1").await;
        store
            .save_client(&Client::new("c1".into(), String::new(), "https://a.b".into()))
            .await
            .unwrap();
        let err = resolver(&store)
            .client_info(&refresh_form("refresh"))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_client");
    }

    #[tokio::test]
    async fn refresh_grant_returns_stored_credentials() {
        let store = Arc::new(FakeStore::default());
        seed_refresh_token(&store, "c1").await;
        store
            .save_client(&Client::new("c1".into(), "s3cret".into(), "https://a.b".into()))
            .await
            .unwrap();
        let creds = resolver(&store)
            .client_info(&refresh_form("refresh"))
            .await
            .unwrap();
        assert_eq!(creds.client_id, "c1");
        assert_eq!(creds.client_secret, "s3cret");
    }

    fn authorize_form(token: Option<&str>) -> FormParams {
        let mut form: FormParams = [
            ("response_type", "code"),
            ("client_id", "c1"),
            ("redirect_uri", "https://a.b/cb"),
            ("state", "xyz"),
        ]
        .into_iter()
        .collect();
        if let Some(token) = token {
            form.insert("token", token);
        }
        form
    }

    async fn authorizer() -> (LoginTokenAuthorizer, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        let verifier = LoginTokenVerifier::new(kv.clone(), SECRET.to_string());
        (LoginTokenAuthorizer::new(verifier), kv)
    }

    fn login_token(uid: &str) -> String {
        AccountClaims::new(uid.into(), TokenPurpose::Login, 300)
            .encode(SECRET)
            .unwrap()
    }

    async fn assert_parked(authorizer: &LoginTokenAuthorizer, form: FormParams) {
        let session = FakeSession::default();
        let outcome = authorizer.authorize_user(&form, &session).await.unwrap();
        assert_eq!(outcome, UserAuthorization::LoginRequired);

        let saved = session.get_return_form().unwrap().expect("form parked");
        assert_eq!(saved.get("client_id"), Some("c1"));
        assert_eq!(saved.get("state"), Some("xyz"));
        assert_eq!(saved.get("token"), None);
    }

    #[tokio::test]
    async fn missing_token_parks_the_request() {
        let (authorizer, _) = authorizer().await;
        assert_parked(&authorizer, authorize_form(None)).await;
    }

    #[tokio::test]
    async fn undecodable_token_parks_the_request() {
        let (authorizer, _) = authorizer().await;
        assert_parked(&authorizer, authorize_form(Some("not-a-jwt"))).await;
    }

    #[tokio::test]
    async fn token_not_matching_the_record_parks_the_request() {
        let (authorizer, kv) = authorizer().await;
        let stale = login_token("b21010101");
        kv.set(
            &keys::login_token("b21010101"),
            &login_token("b21010101"),
            Duration::from_secs(300),
        )
        .await
        .unwrap();
        assert_parked(&authorizer, authorize_form(Some(&stale))).await;
    }

    struct UnavailableKv;

    #[async_trait]
    impl EphemeralStore for UnavailableKv {
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), OAuth2Error> {
            Err(OAuth2Error::server_error("kv unavailable"))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, OAuth2Error> {
            Err(OAuth2Error::server_error("kv unavailable"))
        }

        async fn delete(&self, _key: &str) -> Result<(), OAuth2Error> {
            Err(OAuth2Error::server_error("kv unavailable"))
        }
    }

    #[tokio::test]
    async fn failed_token_lookup_parks_the_request() {
        let verifier = LoginTokenVerifier::new(Arc::new(UnavailableKv), SECRET.to_string());
        let authorizer = LoginTokenAuthorizer::new(verifier);
        let token = login_token("b21010101");
        assert_parked(&authorizer, authorize_form(Some(&token))).await;
    }

    #[tokio::test]
    async fn current_login_token_grants() {
        let (authorizer, kv) = authorizer().await;
        let token = login_token("b21010101");
        kv.set(&keys::login_token("b21010101"), &token, Duration::from_secs(300))
            .await
            .unwrap();

        let session = FakeSession::default();
        let outcome = authorizer
            .authorize_user(&authorize_form(Some(&token)), &session)
            .await
            .unwrap();
        assert_eq!(outcome, UserAuthorization::Granted("b21010101".into()));
        assert!(session.get_return_form().unwrap().is_none());
    }
}
