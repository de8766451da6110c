use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[cfg(feature = "actix")]
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use super::response::{ApiResponse, ErrorCode};

/// Protocol-level error shared by the OAuth engine, actors and storage adapters.
///
/// `error` carries the RFC 6749 error code (`invalid_grant`, ...) or
/// `server_error` for infrastructure failures.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OAuth2Error {
    pub error: String,
    pub error_description: Option<String>,
}

impl OAuth2Error {
    pub fn new(error: &str, description: Option<&str>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.map(|s| s.to_string()),
        }
    }

    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", Some(description))
    }

    pub fn invalid_client(description: &str) -> Self {
        Self::new("invalid_client", Some(description))
    }

    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", Some(description))
    }

    pub fn unauthorized_client(description: &str) -> Self {
        Self::new("unauthorized_client", Some(description))
    }

    pub fn unsupported_grant_type(description: &str) -> Self {
        Self::new("unsupported_grant_type", Some(description))
    }

    pub fn unsupported_response_type(description: &str) -> Self {
        Self::new("unsupported_response_type", Some(description))
    }

    pub fn invalid_scope(description: &str) -> Self {
        Self::new("invalid_scope", Some(description))
    }

    pub fn access_denied(description: &str) -> Self {
        Self::new("access_denied", Some(description))
    }

    pub fn server_error(description: impl fmt::Display) -> Self {
        Self {
            error: "server_error".to_string(),
            error_description: Some(description.to_string()),
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.error == "server_error"
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuth2Error {}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for OAuth2Error {
    fn from(err: sqlx::Error) -> Self {
        // Provide a stable, non-leaky mapping for common constraint violations.
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code().unwrap_or_default();
            let msg = db_err.message();

            // Postgres unique violation: 23505
            // SQLite reports 2067 / 1555 or only the message, depending on build.
            let is_unique = code == "23505"
                || code == "2067"
                || code == "1555"
                || msg.contains("UNIQUE constraint failed")
                || msg.contains("duplicate key");

            if is_unique {
                return Self::invalid_request("duplicate key");
            }
        }

        Self::server_error(err)
    }
}

/// Failure rendered to HTTP clients as the `{success, code, message, data}` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response carrying the envelope.
    pub status: u16,
    pub code: ErrorCode,
    /// Extra, client-safe context appended to the code's message.
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, code: ErrorCode) -> Self {
        Self {
            status,
            code,
            detail: None,
        }
    }

    /// Failure reported with HTTP 200, the convention for auth-type failures.
    pub fn failed(code: ErrorCode) -> Self {
        Self::new(200, code)
    }

    pub fn param(detail: impl Into<String>) -> Self {
        Self::new(400, ErrorCode::ParamError).with_detail(detail)
    }

    /// Internal failure. The cause is logged here and never sent to the client.
    pub fn internal(cause: impl fmt::Display) -> Self {
        tracing::error!(error = %cause, "internal error");
        Self::new(500, ErrorCode::InternalError)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn message(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {}", self.code.message(), detail),
            None => self.code.message().to_string(),
        }
    }

    /// Map an engine/storage error, translating `invalid_grant` to `grant_code`.
    ///
    /// The refresh endpoint passes `ErrorCode::RefreshTokenError` so clients can
    /// tell a dead refresh token apart from a bad authorization code.
    pub fn from_oauth(err: OAuth2Error, grant_code: ErrorCode) -> Self {
        let detail = err.error_description.clone();
        let mapped = match err.error.as_str() {
            "invalid_request" | "unsupported_response_type" => {
                Self::new(400, ErrorCode::ParamError)
            }
            "unsupported_grant_type" => Self::new(400, ErrorCode::UnsupportedGrant),
            "invalid_client" | "unauthorized_client" => Self::new(401, ErrorCode::ClientError),
            "invalid_grant" => Self::new(400, grant_code),
            "invalid_scope" => Self::new(400, ErrorCode::ScopeError),
            "access_denied" | "login_required" => Self::failed(ErrorCode::AuthError),
            _ => return Self::internal(err),
        };

        match detail {
            Some(detail) => mapped.with_detail(detail),
            None => mapped,
        }
    }
}

impl From<OAuth2Error> for ApiError {
    fn from(err: OAuth2Error) -> Self {
        Self::from_oauth(err, ErrorCode::GrantError)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code.code())
    }
}

impl std::error::Error for ApiError {}

#[cfg(feature = "actix")]
impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(ApiResponse::<()>::failed_with(self.code, self.message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_hidden_behind_internal_code() {
        let err = ApiError::from(OAuth2Error::server_error("connection refused on 10.0.0.3"));
        assert_eq!(err.status, 500);
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message().contains("10.0.0.3"));
    }

    #[test]
    fn protocol_errors_keep_their_description() {
        let err = ApiError::from(OAuth2Error::invalid_scope("scope exceeds grant"));
        assert_eq!(err.status, 400);
        assert_eq!(err.code, ErrorCode::ScopeError);
        assert!(err.message().ends_with("scope exceeds grant"));
    }

    #[test]
    fn invalid_grant_uses_the_callers_code() {
        let err = ApiError::from_oauth(
            OAuth2Error::invalid_grant("refresh token not found"),
            ErrorCode::RefreshTokenError,
        );
        assert_eq!(err.code, ErrorCode::RefreshTokenError);

        let err = ApiError::from(OAuth2Error::invalid_grant("code used"));
        assert_eq!(err.code, ErrorCode::GrantError);
    }

    #[test]
    fn client_errors_are_unauthorized() {
        let err = ApiError::from(OAuth2Error::invalid_client("bad secret"));
        assert_eq!(err.status, 401);
        assert_eq!(err.code, ErrorCode::ClientError);
    }

    #[test]
    fn login_required_is_a_failed_envelope() {
        let err = ApiError::from(OAuth2Error::new("login_required", None));
        assert_eq!(err.status, 200);
        assert_eq!(err.code, ErrorCode::AuthError);
        assert_eq!(err.message(), ErrorCode::AuthError.message());
    }
}
