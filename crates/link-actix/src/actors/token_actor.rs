use actix::prelude::*;
use chrono::{DateTime, Duration, Utc};
use link_observability::annotate_span_with_trace_ids;
use link_ports::DynTokenStore;
use tracing::Instrument;

use link_core::{Claims, OAuth2Error, Token};

/// Lifetimes applied to newly issued tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

pub struct TokenActor {
    tokens: DynTokenStore,
    jwt_secret: String,
    lifetimes: TokenLifetimes,
}

impl TokenActor {
    pub fn new(tokens: DynTokenStore, jwt_secret: String, lifetimes: TokenLifetimes) -> Self {
        Self {
            tokens,
            jwt_secret,
            lifetimes,
        }
    }
}

impl Actor for TokenActor {
    type Context = Context<Self>;
}

fn token_prefix(token: &str) -> String {
    token.trim().chars().take(12).collect()
}

/// Every scope in `requested` must also appear in `granted`.
fn scope_is_subset(requested: &str, granted: &str) -> bool {
    let granted: Vec<&str> = granted.split_whitespace().collect();
    requested
        .split_whitespace()
        .all(|scope| granted.contains(&scope))
}

async fn issue_token(
    tokens: &DynTokenStore,
    jwt_secret: &str,
    lifetimes: TokenLifetimes,
    user_id: Option<String>,
    client_id: String,
    scope: String,
    refresh_expires_at: Option<DateTime<Utc>>,
) -> Result<Token, OAuth2Error> {
    let subject = user_id.clone().unwrap_or_else(|| client_id.clone());

    let access_token = Claims::new(
        subject.clone(),
        client_id.clone(),
        scope.clone(),
        lifetimes.access_ttl_secs,
    )
    .encode(jwt_secret)
    .map_err(OAuth2Error::server_error)?;

    let token = match refresh_expires_at {
        Some(refresh_expires_at) => {
            let refresh_ttl = (refresh_expires_at - Utc::now()).num_seconds().max(0);
            let refresh_token = Claims::new(subject, client_id.clone(), scope.clone(), refresh_ttl)
                .encode(jwt_secret)
                .map_err(OAuth2Error::server_error)?;
            Token::new(
                access_token,
                Some(refresh_token),
                client_id,
                user_id,
                scope,
                lifetimes.access_ttl_secs,
            )
            .with_refresh_expiry(refresh_expires_at)
        }
        None => Token::new(
            access_token,
            None,
            client_id,
            user_id,
            scope,
            lifetimes.access_ttl_secs,
        ),
    };

    tokens.save_token(&token).await?;
    Ok(token)
}

#[derive(Message)]
#[rtype(result = "Result<Token, OAuth2Error>")]
pub struct CreateToken {
    pub user_id: Option<String>,
    pub client_id: String,
    pub scope: String,
    pub include_refresh: bool,
    pub span: tracing::Span,
}

impl Handler<CreateToken> for TokenActor {
    type Result = ResponseFuture<Result<Token, OAuth2Error>>;

    fn handle(&mut self, msg: CreateToken, _: &mut Self::Context) -> Self::Result {
        let tokens = self.tokens.clone();
        let jwt_secret = self.jwt_secret.clone();
        let lifetimes = self.lifetimes;

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.token.create",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            client_id = %msg.client_id,
            user_id = %msg.user_id.as_deref().unwrap_or(""),
            include_refresh = msg.include_refresh
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let refresh_expires_at = msg
                    .include_refresh
                    .then(|| Utc::now() + Duration::seconds(lifetimes.refresh_ttl_secs));

                issue_token(
                    &tokens,
                    &jwt_secret,
                    lifetimes,
                    msg.user_id,
                    msg.client_id,
                    msg.scope,
                    refresh_expires_at,
                )
                .await
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<Token, OAuth2Error>")]
pub struct ValidateToken {
    pub token: String,
    pub span: tracing::Span,
}

impl Handler<ValidateToken> for TokenActor {
    type Result = ResponseFuture<Result<Token, OAuth2Error>>;

    fn handle(&mut self, msg: ValidateToken, _: &mut Self::Context) -> Self::Result {
        let tokens = self.tokens.clone();
        let parent_span = msg.span.clone();
        let raw_token = msg.token;
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.token.validate",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            token_prefix = %token_prefix(&raw_token),
            token_len = raw_token.len()
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let token = tokens
                    .get_token_by_access_token(raw_token.trim())
                    .await?
                    .ok_or_else(|| OAuth2Error::invalid_grant("Token not found"))?;

                if !token.is_valid() {
                    tracing::warn!(
                        revoked = token.revoked,
                        expires_at = %token.expires_at,
                        "Token is not valid (expired or revoked)"
                    );
                    return Err(OAuth2Error::invalid_grant("Token is expired or revoked"));
                }

                Ok(token)
            }
            .instrument(actor_span),
        )
    }
}

/// Rotate a refresh token: the old record is revoked and a fresh pair issued.
#[derive(Message)]
#[rtype(result = "Result<Token, OAuth2Error>")]
pub struct RefreshAccessToken {
    pub refresh_token: String,
    pub client_id: String,
    /// Narrower scope to request; defaults to the original grant.
    pub scope: Option<String>,
    pub span: tracing::Span,
}

impl Handler<RefreshAccessToken> for TokenActor {
    type Result = ResponseFuture<Result<Token, OAuth2Error>>;

    fn handle(&mut self, msg: RefreshAccessToken, _: &mut Self::Context) -> Self::Result {
        let tokens = self.tokens.clone();
        let jwt_secret = self.jwt_secret.clone();
        let lifetimes = self.lifetimes;

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.token.refresh",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            client_id = %msg.client_id,
            token_prefix = %token_prefix(&msg.refresh_token)
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let old = tokens
                    .get_token_by_refresh_token(&msg.refresh_token)
                    .await?
                    .ok_or_else(|| OAuth2Error::invalid_grant("Refresh token not found"))?;

                if old.client_id != msg.client_id {
                    return Err(OAuth2Error::invalid_grant("Client ID mismatch"));
                }

                if !old.is_refreshable() {
                    return Err(OAuth2Error::invalid_grant(
                        "Refresh token is expired or revoked",
                    ));
                }

                let scope = match msg.scope.filter(|s| !s.trim().is_empty()) {
                    Some(requested) if !scope_is_subset(&requested, &old.scope) => {
                        return Err(OAuth2Error::invalid_scope(
                            "Requested scope exceeds the original grant",
                        ));
                    }
                    Some(requested) => requested,
                    None => old.scope.clone(),
                };

                if !tokens.consume_refresh_token(&msg.refresh_token).await? {
                    return Err(OAuth2Error::invalid_grant(
                        "Refresh token is expired or revoked",
                    ));
                }

                issue_token(
                    &tokens,
                    &jwt_secret,
                    lifetimes,
                    old.user_id,
                    old.client_id,
                    scope,
                    old.refresh_expires_at,
                )
                .await
            }
            .instrument(actor_span),
        )
    }
}
