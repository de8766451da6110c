use serde::{Deserialize, Serialize};

/// Business error codes carried in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParamError,
    InternalError,
    AuthError,
    AccessTokenError,
    ClientError,
    RefreshTokenError,
    GrantError,
    ScopeError,
    UnsupportedGrant,
    UserInfoFail,
    UserExist,
    UserNotExist,
    CredentialError,
    TicketError,
    CaptchaError,
    NotVerified,
    PasswordIllegal,
    EmailError,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        match self {
            ErrorCode::ParamError => 10001,
            ErrorCode::InternalError => 10002,
            ErrorCode::AuthError => 20001,
            ErrorCode::AccessTokenError => 20002,
            ErrorCode::ClientError => 20003,
            ErrorCode::RefreshTokenError => 20004,
            ErrorCode::GrantError => 20005,
            ErrorCode::ScopeError => 20006,
            ErrorCode::UnsupportedGrant => 20007,
            ErrorCode::UserInfoFail => 30001,
            ErrorCode::UserExist => 30002,
            ErrorCode::UserNotExist => 30003,
            ErrorCode::CredentialError => 30004,
            ErrorCode::TicketError => 30005,
            ErrorCode::CaptchaError => 30006,
            ErrorCode::NotVerified => 30007,
            ErrorCode::PasswordIllegal => 30008,
            ErrorCode::EmailError => 30009,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParamError => "parameter error",
            ErrorCode::InternalError => "internal error",
            ErrorCode::AuthError => "authentication required",
            ErrorCode::AccessTokenError => "invalid access token",
            ErrorCode::ClientError => "invalid client",
            ErrorCode::RefreshTokenError => "invalid refresh token",
            ErrorCode::GrantError => "invalid grant",
            ErrorCode::ScopeError => "invalid scope",
            ErrorCode::UnsupportedGrant => "unsupported grant type",
            ErrorCode::UserInfoFail => "failed to get user info",
            ErrorCode::UserExist => "user already exists",
            ErrorCode::UserNotExist => "user does not exist",
            ErrorCode::CredentialError => "invalid username or password",
            ErrorCode::TicketError => "invalid or expired ticket",
            ErrorCode::CaptchaError => "invalid or expired verification code",
            ErrorCode::NotVerified => "email not verified",
            ErrorCode::PasswordIllegal => "password does not meet requirements",
            ErrorCode::EmailError => "failed to send email",
        }
    }
}

/// JSON envelope returned by every non-OAuth-protocol endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// `0` on success, otherwise `ErrorCode::code()`.
    pub code: u32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: 0,
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn failed(code: ErrorCode) -> Self {
        Self::failed_with(code, code.message())
    }

    pub fn failed_with(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: 0,
            message: "ok".to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_envelope_has_no_data() {
        let json = serde_json::to_value(ApiResponse::<()>::failed(ErrorCode::ParamError)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], 10001);
        assert_eq!(json["message"], "parameter error");
        assert!(json["data"].is_null());
    }

    #[test]
    fn success_envelope_carries_data() {
        let json = serde_json::to_value(ApiResponse::success(serde_json::json!({"uid": "b1"})))
            .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"]["uid"], "b1");
    }

    #[test]
    fn codes_are_unique() {
        use std::collections::HashSet;
        let all = [
            ErrorCode::ParamError,
            ErrorCode::InternalError,
            ErrorCode::AuthError,
            ErrorCode::AccessTokenError,
            ErrorCode::ClientError,
            ErrorCode::RefreshTokenError,
            ErrorCode::GrantError,
            ErrorCode::ScopeError,
            ErrorCode::UnsupportedGrant,
            ErrorCode::UserInfoFail,
            ErrorCode::UserExist,
            ErrorCode::UserNotExist,
            ErrorCode::CredentialError,
            ErrorCode::TicketError,
            ErrorCode::CaptchaError,
            ErrorCode::NotVerified,
            ErrorCode::PasswordIllegal,
            ErrorCode::EmailError,
        ];
        let codes: HashSet<u32> = all.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), all.len());
    }
}
