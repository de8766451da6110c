use async_trait::async_trait;

use link_core::{ClientCredentials, FormParams, OAuth2Error};

use crate::session::SessionStore;

/// Resolves which client is making a token request and the secret it must present.
#[async_trait]
pub trait ClientInfoHandler: Send + Sync {
    async fn client_info(&self, form: &FormParams) -> Result<ClientCredentials, OAuth2Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAuthorization {
    /// The resource owner is authenticated; carries their uid.
    Granted(String),
    /// Not authenticated. The caller should send the user to log in.
    LoginRequired,
}

/// Decides whether the current authorization request has an authenticated user.
///
/// The session is request-local, so the returned future is not `Send`.
#[async_trait(?Send)]
pub trait UserAuthorizationHandler: Send + Sync {
    async fn authorize_user(
        &self,
        form: &FormParams,
        session: &dyn SessionStore,
    ) -> Result<UserAuthorization, OAuth2Error>;
}
