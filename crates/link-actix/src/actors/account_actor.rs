//! Registration, verification and login.
//!
//! Ephemeral state lives in the key-value store under the keys from
//! [`link_core::keys`]. Failures are returned as [`ApiError`] because each one
//! maps to a specific business code in the response envelope.

use std::time::Duration;

use actix::prelude::*;
use link_observability::{annotate_span_with_trace_ids, Metrics};
use link_ports::{DynEphemeralStore, DynMailer, DynUserStore};
use rand::Rng;
use subtle::ConstantTimeEq;
use tracing::Instrument;

use link_core::{keys, AccountClaims, AccountInfo, ApiError, ErrorCode, TokenPurpose, User};

use crate::password::{hash_password, password_is_legal, verify_password};

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub jwt_secret: String,
    pub login_token_ttl_secs: i64,
    /// Lifetime of tickets, verification codes and the verified marker.
    pub verification_ttl: Duration,
    pub email_subject: String,
}

#[derive(Clone)]
pub struct AccountActor {
    users: DynUserStore,
    kv: DynEphemeralStore,
    mailer: DynMailer,
    settings: AccountSettings,
    metrics: Option<Metrics>,
}

impl AccountActor {
    pub fn new(
        users: DynUserStore,
        kv: DynEphemeralStore,
        mailer: DynMailer,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users,
            kv,
            mailer,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decode a registration ticket and check it is the one currently on record.
    ///
    /// Returns the email the ticket was issued for.
    async fn resolve_ticket(&self, ticket: &str) -> Result<String, ApiError> {
        let claims =
            AccountClaims::decode(ticket, &self.settings.jwt_secret, TokenPurpose::Ticket)
                .map_err(|_| ApiError::failed(ErrorCode::TicketError))?;

        let stored = self.kv.get(&keys::ticket(&claims.sub)).await?;
        if stored.as_deref() != Some(ticket) {
            return Err(ApiError::failed(ErrorCode::TicketError));
        }
        Ok(claims.sub)
    }

    fn ttl_secs(&self) -> i64 {
        self.settings.verification_ttl.as_secs() as i64
    }
}

impl Actor for AccountActor {
    type Context = Context<Self>;
}

fn looks_like_email(candidate: &str) -> bool {
    !candidate.chars().any(char::is_whitespace)
        && User::uid_from_email(candidate).is_some()
        && candidate
            .rsplit_once('@')
            .map(|(_, domain)| domain.contains('.') && !domain.ends_with('.'))
            .unwrap_or(false)
}

fn verification_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

/// Start registration for an email address, returning a ticket.
#[derive(Message)]
#[rtype(result = "Result<String, ApiError>")]
pub struct VerifyAccount {
    pub username: String,
    pub span: tracing::Span,
}

impl Handler<VerifyAccount> for AccountActor {
    type Result = ResponseFuture<Result<String, ApiError>>;

    fn handle(&mut self, msg: VerifyAccount, _: &mut Self::Context) -> Self::Result {
        let this = self.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.verify",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let email = msg.username.trim().to_ascii_lowercase();
                if !looks_like_email(&email) {
                    return Err(ApiError::param("username must be an email address"));
                }

                if this.users.get_user_by_email(&email).await?.is_some() {
                    return Err(ApiError::failed(ErrorCode::UserExist));
                }
                // The uid is derived from the local part, so it must be free too.
                if let Some(uid) = User::uid_from_email(&email) {
                    if this.users.get_user_by_uid(&uid).await?.is_some() {
                        return Err(ApiError::failed(ErrorCode::UserExist));
                    }
                }

                let ticket = AccountClaims::new(email.clone(), TokenPurpose::Ticket, this.ttl_secs())
                    .encode(&this.settings.jwt_secret)
                    .map_err(ApiError::internal)?;

                this.kv
                    .set(&keys::ticket(&email), &ticket, this.settings.verification_ttl)
                    .await?;

                Ok(ticket)
            }
            .instrument(actor_span),
        )
    }
}

/// Mail a verification code to the ticket's email address.
#[derive(Message)]
#[rtype(result = "Result<(), ApiError>")]
pub struct SendVerifyCode {
    pub ticket: String,
    pub span: tracing::Span,
}

impl Handler<SendVerifyCode> for AccountActor {
    type Result = ResponseFuture<Result<(), ApiError>>;

    fn handle(&mut self, msg: SendVerifyCode, _: &mut Self::Context) -> Self::Result {
        let this = self.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.send_code",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let email = this.resolve_ticket(&msg.ticket).await?;
                let code = verification_code();

                this.kv
                    .set(
                        &keys::verify_code(&email),
                        &code,
                        this.settings.verification_ttl,
                    )
                    .await?;

                let valid_minutes = this.settings.verification_ttl.as_secs().div_ceil(60);
                let mail = link_mail::verification_email(
                    &email,
                    &this.settings.email_subject,
                    &code,
                    valid_minutes,
                );
                if let Err(err) = this.mailer.send(mail).await {
                    tracing::error!(error = %err, "failed to send verification email");
                    return Err(ApiError::failed(ErrorCode::EmailError));
                }

                if let Some(metrics) = &this.metrics {
                    metrics.verification_emails_sent_total.inc();
                }
                Ok(())
            }
            .instrument(actor_span),
        )
    }
}

/// Check a mailed code; on success the email is marked verified.
#[derive(Message)]
#[rtype(result = "Result<(), ApiError>")]
pub struct CheckVerifyCode {
    pub ticket: String,
    pub captcha: String,
    pub span: tracing::Span,
}

impl Handler<CheckVerifyCode> for AccountActor {
    type Result = ResponseFuture<Result<(), ApiError>>;

    fn handle(&mut self, msg: CheckVerifyCode, _: &mut Self::Context) -> Self::Result {
        let this = self.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.check_code",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let email = this.resolve_ticket(&msg.ticket).await?;
                let code_key = keys::verify_code(&email);

                let matches = this
                    .kv
                    .get(&code_key)
                    .await?
                    .map(|stored| bool::from(stored.as_bytes().ct_eq(msg.captcha.trim().as_bytes())))
                    .unwrap_or(false);
                if !matches {
                    return Err(ApiError::failed(ErrorCode::CaptchaError));
                }

                this.kv.delete(&code_key).await?;
                this.kv
                    .set(&keys::verified(&email), "1", this.settings.verification_ttl)
                    .await?;

                Ok(())
            }
            .instrument(actor_span),
        )
    }
}

/// Create the account for a verified ticket.
#[derive(Message)]
#[rtype(result = "Result<AccountInfo, ApiError>")]
pub struct Register {
    pub ticket: String,
    pub password: String,
    pub span: tracing::Span,
}

impl Handler<Register> for AccountActor {
    type Result = ResponseFuture<Result<AccountInfo, ApiError>>;

    fn handle(&mut self, msg: Register, _: &mut Self::Context) -> Self::Result {
        let this = self.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.register",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            uid = tracing::field::Empty
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let email = this.resolve_ticket(&msg.ticket).await?;

                if this.kv.get(&keys::verified(&email)).await?.is_none() {
                    return Err(ApiError::failed(ErrorCode::NotVerified));
                }

                if !password_is_legal(&msg.password) {
                    return Err(ApiError::failed(ErrorCode::PasswordIllegal));
                }

                let uid = User::uid_from_email(&email)
                    .ok_or_else(|| ApiError::param("username must be an email address"))?;
                tracing::Span::current().record("uid", uid.as_str());

                if this.users.get_user_by_uid(&uid).await?.is_some()
                    || this.users.get_user_by_email(&email).await?.is_some()
                {
                    return Err(ApiError::failed(ErrorCode::UserExist));
                }

                let password = msg.password;
                let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
                    .await
                    .map_err(ApiError::internal)?
                    .map_err(ApiError::internal)?;

                let user = User::new(uid, email.clone(), password_hash);
                if let Err(err) = this.users.save_user(&user).await {
                    // A concurrent registration won the unique constraint.
                    if err.error == "invalid_request" {
                        return Err(ApiError::failed(ErrorCode::UserExist));
                    }
                    return Err(err.into());
                }

                this.kv.delete(&keys::ticket(&email)).await?;
                this.kv.delete(&keys::verified(&email)).await?;

                if let Some(metrics) = &this.metrics {
                    metrics.account_registrations_total.inc();
                }
                tracing::info!("account registered");

                Ok(AccountInfo::from(&user))
            }
            .instrument(actor_span),
        )
    }
}

/// Authenticate with email or uid plus password, returning a login token.
#[derive(Message)]
#[rtype(result = "Result<String, ApiError>")]
pub struct Login {
    pub username: String,
    pub password: String,
    pub span: tracing::Span,
}

impl Handler<Login> for AccountActor {
    type Result = ResponseFuture<Result<String, ApiError>>;

    fn handle(&mut self, msg: Login, _: &mut Self::Context) -> Self::Result {
        let this = self.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.login",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            uid = tracing::field::Empty
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let username = msg.username.trim().to_ascii_lowercase();
                let user = if username.contains('@') {
                    this.users.get_user_by_email(&username).await?
                } else {
                    this.users.get_user_by_uid(&username).await?
                };

                let verified = match user {
                    Some(user) => {
                        let password = msg.password;
                        let hash = user.password_hash.clone();
                        let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                            .await
                            .map_err(ApiError::internal)?;
                        ok.then_some(user)
                    }
                    None => None,
                };

                let Some(user) = verified else {
                    if let Some(metrics) = &this.metrics {
                        metrics.record_login(false);
                    }
                    return Err(ApiError::failed(ErrorCode::CredentialError));
                };
                tracing::Span::current().record("uid", user.uid.as_str());

                let ttl = this.settings.login_token_ttl_secs;
                let token = AccountClaims::new(user.uid.clone(), TokenPurpose::Login, ttl)
                    .encode(&this.settings.jwt_secret)
                    .map_err(ApiError::internal)?;

                this.kv
                    .set(
                        &keys::login_token(&user.uid),
                        &token,
                        Duration::from_secs(ttl.max(0) as u64),
                    )
                    .await?;

                if let Some(metrics) = &this.metrics {
                    metrics.record_login(true);
                }
                Ok(token)
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<(), ApiError>")]
pub struct Logout {
    pub uid: String,
    pub span: tracing::Span,
}

impl Handler<Logout> for AccountActor {
    type Result = ResponseFuture<Result<(), ApiError>>;

    fn handle(&mut self, msg: Logout, _: &mut Self::Context) -> Self::Result {
        let kv = self.kv.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.logout",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            uid = %msg.uid
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                kv.delete(&keys::login_token(&msg.uid)).await?;
                Ok(())
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<AccountInfo, ApiError>")]
pub struct GetUser {
    pub uid: String,
    pub span: tracing::Span,
}

impl Handler<GetUser> for AccountActor {
    type Result = ResponseFuture<Result<AccountInfo, ApiError>>;

    fn handle(&mut self, msg: GetUser, _: &mut Self::Context) -> Self::Result {
        let users = self.users.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.account.get",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            uid = %msg.uid
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                users
                    .get_user_by_uid(&msg.uid)
                    .await?
                    .map(|user| AccountInfo::from(&user))
                    .ok_or_else(|| ApiError::failed(ErrorCode::UserNotExist))
            }
            .instrument(actor_span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert!(looks_like_email("b21010101@njupt.edu.cn"));
        assert!(!looks_like_email("b21010101"));
        assert!(!looks_like_email("@njupt.edu.cn"));
        assert!(!looks_like_email("a b@njupt.edu.cn"));
        assert!(!looks_like_email("a@localhost"));
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..32 {
            let code = verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
