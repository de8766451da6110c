//! Login-token verification and the extractor guarding account routes.

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use link_ports::DynEphemeralStore;

use link_core::{keys, AccountClaims, ApiError, ErrorCode, TokenPurpose};

/// Checks login tokens against their signature and the server-side record.
#[derive(Clone)]
pub struct LoginTokenVerifier {
    kv: DynEphemeralStore,
    secret: String,
}

impl LoginTokenVerifier {
    pub fn new(kv: DynEphemeralStore, secret: String) -> Self {
        Self { kv, secret }
    }

    /// Resolve the uid a login token belongs to.
    ///
    /// `None` when the token does not decode, names no user, or is not the
    /// user's current login token. Store failures are logged and treated the same.
    pub async fn verify(&self, token: &str) -> Option<String> {
        let claims = AccountClaims::decode(token, &self.secret, TokenPurpose::Login).ok()?;
        if claims.sub.trim().is_empty() {
            return None;
        }

        match self.kv.get(&keys::login_token(&claims.sub)).await {
            Ok(Some(current)) if current == token => Some(claims.sub),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "login token lookup failed");
                None
            }
        }
    }
}

/// Value of an `Authorization: Bearer <token>` header, if well formed.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// uid of the caller, from a verified login token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let verifier = req.app_data::<web::Data<LoginTokenVerifier>>().cloned();
        let token = bearer_token(req).map(str::to_string);

        Box::pin(async move {
            let verifier = verifier
                .ok_or_else(|| ApiError::internal("LoginTokenVerifier is not registered"))?;
            let token = token.ok_or_else(|| ApiError::failed(ErrorCode::AuthError))?;
            verifier
                .verify(&token)
                .await
                .map(AuthenticatedUser)
                .ok_or_else(|| ApiError::failed(ErrorCode::AuthError))
        })
    }
}
