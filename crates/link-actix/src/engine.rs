//! The OAuth2 engine: validates authorize and token requests and drives the
//! actors that issue codes and tokens.
//!
//! Client lookup for token requests and resource-owner authentication are
//! delegated to the [`ClientInfoHandler`] and [`UserAuthorizationHandler`]
//! strategies the engine is built with.

use std::sync::Arc;

use actix::Addr;
use link_observability::Metrics;
use link_ports::{ClientInfoHandler, SessionStore, UserAuthorization, UserAuthorizationHandler};
use url::Url;

use link_core::{FormParams, OAuth2Error, Token};

use crate::actors::{
    mailbox_error, AuthActor, ClientActor, CreateAuthorizationCode, CreateToken, GetClient,
    MarkAuthorizationCodeUsed, RefreshAccessToken, TokenActor, ValidateAuthorizationCode,
    ValidateClient, ValidateToken,
};

/// Result of a successful authorize request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// Send the user agent back to the client with `code` (and `state`).
    Redirect(Url),
    /// No authenticated user; the request was parked in the session.
    LoginRequired,
}

pub struct OAuthServer {
    clients: Addr<ClientActor>,
    auth: Addr<AuthActor>,
    tokens: Addr<TokenActor>,
    client_info: Arc<dyn ClientInfoHandler>,
    user_authorizer: Arc<dyn UserAuthorizationHandler>,
    metrics: Option<Metrics>,
}

impl OAuthServer {
    pub fn new(
        clients: Addr<ClientActor>,
        auth: Addr<AuthActor>,
        tokens: Addr<TokenActor>,
        client_info: Arc<dyn ClientInfoHandler>,
        user_authorizer: Arc<dyn UserAuthorizationHandler>,
    ) -> Self {
        Self {
            clients,
            auth,
            tokens,
            client_info,
            user_authorizer,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate an authorization request and, if a user is signed in, issue a code.
    ///
    /// The client and redirect URI are checked before the user so that an
    /// invalid request is never parked in the session.
    pub async fn handle_authorize_request(
        &self,
        form: &FormParams,
        session: &dyn SessionStore,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let span = tracing::Span::current();

        match form.get_non_empty("response_type") {
            Some("code") => {}
            Some(_) => {
                return Err(OAuth2Error::unsupported_response_type(
                    "Only response_type=code is supported",
                ))
            }
            None => return Err(OAuth2Error::invalid_request("Missing response_type")),
        }

        let client_id = form
            .get_non_empty("client_id")
            .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id"))?;
        let redirect_uri = form
            .get_non_empty("redirect_uri")
            .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri"))?;

        let client = self
            .clients
            .send(GetClient {
                client_id: client_id.to_string(),
                span: span.clone(),
            })
            .await
            .map_err(mailbox_error)??;

        if !client.accepts_redirect_uri(redirect_uri) {
            return Err(OAuth2Error::invalid_request(
                "redirect_uri does not match the registered domain",
            ));
        }

        let mut redirect = Url::parse(redirect_uri)
            .map_err(|_| OAuth2Error::invalid_request("Invalid redirect_uri"))?;
        if redirect.fragment().is_some() {
            return Err(OAuth2Error::invalid_request(
                "redirect_uri must not contain a fragment",
            ));
        }

        let code_challenge = form.get_non_empty("code_challenge").map(str::to_string);
        let code_challenge_method = match (&code_challenge, form.get_non_empty("code_challenge_method")) {
            (None, _) => None,
            (Some(_), None) => Some("plain".to_string()),
            (Some(_), Some(method @ ("plain" | "S256"))) => Some(method.to_string()),
            (Some(_), Some(_)) => {
                return Err(OAuth2Error::invalid_request(
                    "Unsupported code_challenge_method",
                ))
            }
        };

        let user_id = match self.user_authorizer.authorize_user(form, session).await? {
            UserAuthorization::Granted(user_id) => user_id,
            UserAuthorization::LoginRequired => return Ok(AuthorizeOutcome::LoginRequired),
        };

        let auth_code = self
            .auth
            .send(CreateAuthorizationCode {
                client_id: client.client_id,
                user_id,
                redirect_uri: redirect_uri.to_string(),
                scope: form.get("scope").unwrap_or_default().trim().to_string(),
                code_challenge,
                code_challenge_method,
                span,
            })
            .await
            .map_err(mailbox_error)??;

        if let Some(metrics) = &self.metrics {
            metrics.oauth_codes_issued_total.inc();
        }

        {
            let mut qp = redirect.query_pairs_mut();
            qp.append_pair("code", &auth_code.code);
            if let Some(state) = form.get("state") {
                qp.append_pair("state", state);
            }
        }

        Ok(AuthorizeOutcome::Redirect(redirect))
    }

    /// Authenticate the client and exchange a grant for a token.
    pub async fn handle_token_request(&self, form: &FormParams) -> Result<Token, OAuth2Error> {
        let span = tracing::Span::current();

        let grant_type = form
            .get_non_empty("grant_type")
            .ok_or_else(|| OAuth2Error::invalid_request("Missing grant_type"))?;
        if !matches!(
            grant_type,
            "authorization_code" | "refresh_token" | "client_credentials"
        ) {
            return Err(OAuth2Error::unsupported_grant_type(&format!(
                "Grant type '{grant_type}' not supported"
            )));
        }

        let credentials = self.client_info.client_info(form).await?;

        let valid = self
            .clients
            .send(ValidateClient {
                client_id: credentials.client_id.clone(),
                client_secret: credentials.client_secret,
                span: span.clone(),
            })
            .await
            .map_err(mailbox_error)??;
        if !valid {
            return Err(OAuth2Error::invalid_client("Invalid client credentials"));
        }

        let token = match grant_type {
            "authorization_code" => {
                let code = form
                    .get_non_empty("code")
                    .ok_or_else(|| OAuth2Error::invalid_request("Missing code"))?;
                let redirect_uri = form
                    .get_non_empty("redirect_uri")
                    .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri"))?;

                let auth_code = self
                    .auth
                    .send(ValidateAuthorizationCode {
                        code: code.to_string(),
                        client_id: credentials.client_id.clone(),
                        redirect_uri: redirect_uri.to_string(),
                        code_verifier: form.get_non_empty("code_verifier").map(str::to_string),
                        span: span.clone(),
                    })
                    .await
                    .map_err(mailbox_error)??;

                self.auth
                    .send(MarkAuthorizationCodeUsed {
                        code: code.to_string(),
                        span: span.clone(),
                    })
                    .await
                    .map_err(mailbox_error)??;

                self.tokens
                    .send(CreateToken {
                        user_id: Some(auth_code.user_id),
                        client_id: auth_code.client_id,
                        scope: auth_code.scope,
                        include_refresh: true,
                        span,
                    })
                    .await
                    .map_err(mailbox_error)??
            }
            "refresh_token" => {
                let refresh_token = form
                    .get_non_empty("refresh_token")
                    .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

                let token = self
                    .tokens
                    .send(RefreshAccessToken {
                        refresh_token: refresh_token.to_string(),
                        client_id: credentials.client_id,
                        scope: form.get_non_empty("scope").map(str::to_string),
                        span,
                    })
                    .await
                    .map_err(mailbox_error)??;

                if let Some(metrics) = &self.metrics {
                    metrics.oauth_tokens_refreshed_total.inc();
                }
                token
            }
            _ => self
                .tokens
                .send(CreateToken {
                    user_id: None,
                    client_id: credentials.client_id,
                    scope: form.get("scope").unwrap_or_default().trim().to_string(),
                    include_refresh: false,
                    span,
                })
                .await
                .map_err(mailbox_error)??,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_token_issued(grant_type);
        }

        Ok(token)
    }

    /// Look up a live (unexpired, unrevoked) access token.
    pub async fn load_access_token(&self, access_token: &str) -> Result<Token, OAuth2Error> {
        self.tokens
            .send(ValidateToken {
                token: access_token.to_string(),
                span: tracing::Span::current(),
            })
            .await
            .map_err(mailbox_error)?
    }
}
