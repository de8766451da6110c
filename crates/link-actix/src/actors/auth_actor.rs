use actix::prelude::*;
use link_observability::annotate_span_with_trace_ids;
use link_ports::DynTokenStore;
use tracing::Instrument;

use link_core::{validate_pkce, AuthorizationCode, OAuth2Error};

use super::random_alphanumeric;

const CODE_LEN: usize = 32;

/// Issues and redeems authorization codes.
pub struct AuthActor {
    tokens: DynTokenStore,
    code_ttl_secs: i64,
}

impl AuthActor {
    pub fn new(tokens: DynTokenStore, code_ttl_secs: i64) -> Self {
        Self {
            tokens,
            code_ttl_secs,
        }
    }
}

impl Actor for AuthActor {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "Result<AuthorizationCode, OAuth2Error>")]
pub struct CreateAuthorizationCode {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub span: tracing::Span,
}

impl Handler<CreateAuthorizationCode> for AuthActor {
    type Result = ResponseFuture<Result<AuthorizationCode, OAuth2Error>>;

    fn handle(&mut self, msg: CreateAuthorizationCode, _: &mut Self::Context) -> Self::Result {
        let tokens = self.tokens.clone();
        let ttl = self.code_ttl_secs;

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.auth.create_code",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            client_id = %msg.client_id,
            user_id = %msg.user_id,
            pkce = msg.code_challenge.is_some()
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let auth_code = AuthorizationCode::new(
                    random_alphanumeric(CODE_LEN),
                    msg.client_id,
                    msg.user_id,
                    msg.redirect_uri,
                    msg.scope,
                    msg.code_challenge,
                    msg.code_challenge_method,
                    ttl,
                );

                tokens.save_authorization_code(&auth_code).await?;

                Ok(auth_code)
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<AuthorizationCode, OAuth2Error>")]
pub struct ValidateAuthorizationCode {
    pub code: String,
    pub client_id: String,
    /// Must equal the `redirect_uri` the code was issued for.
    pub redirect_uri: String,
    pub code_verifier: Option<String>,
    pub span: tracing::Span,
}

impl Handler<ValidateAuthorizationCode> for AuthActor {
    type Result = ResponseFuture<Result<AuthorizationCode, OAuth2Error>>;

    fn handle(&mut self, msg: ValidateAuthorizationCode, _: &mut Self::Context) -> Self::Result {
        let tokens = self.tokens.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.auth.validate_code",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            client_id = %msg.client_id,
            code_prefix = %msg.code.chars().take(12).collect::<String>()
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let auth_code = tokens
                    .get_authorization_code(&msg.code)
                    .await?
                    .ok_or_else(|| OAuth2Error::invalid_grant("Invalid authorization code"))?;

                if !auth_code.is_valid() {
                    return Err(OAuth2Error::invalid_grant(
                        "Authorization code is expired or used",
                    ));
                }

                if auth_code.client_id != msg.client_id {
                    return Err(OAuth2Error::invalid_grant("Client ID mismatch"));
                }

                if auth_code.redirect_uri != msg.redirect_uri {
                    return Err(OAuth2Error::invalid_grant("Redirect URI mismatch"));
                }

                if let Some(challenge) = auth_code.code_challenge.as_deref() {
                    let verifier = msg
                        .code_verifier
                        .as_deref()
                        .ok_or_else(|| OAuth2Error::invalid_grant("Code verifier required"))?;
                    let method = auth_code
                        .code_challenge_method
                        .as_deref()
                        .unwrap_or("plain");
                    if !validate_pkce(challenge, verifier, method) {
                        return Err(OAuth2Error::invalid_grant("Invalid code verifier"));
                    }
                }

                Ok(auth_code)
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<(), OAuth2Error>")]
pub struct MarkAuthorizationCodeUsed {
    pub code: String,
    pub span: tracing::Span,
}

impl Handler<MarkAuthorizationCodeUsed> for AuthActor {
    type Result = ResponseFuture<Result<(), OAuth2Error>>;

    fn handle(&mut self, msg: MarkAuthorizationCodeUsed, _: &mut Self::Context) -> Self::Result {
        let tokens = self.tokens.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.auth.consume_code",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                if tokens.mark_authorization_code_used(&msg.code).await? {
                    Ok(())
                } else {
                    // Lost a race with a concurrent exchange of the same code.
                    Err(OAuth2Error::invalid_grant(
                        "Authorization code is expired or used",
                    ))
                }
            }
            .instrument(actor_span),
        )
    }
}
