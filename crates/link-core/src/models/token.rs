use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// An issued access token and its optional refresh token.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
    pub client_id: String,
    /// Owning user's uid; `None` for client-credentials tokens.
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl Token {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        client_id: String,
        user_id: Option<String>,
        scope: String,
        expires_in: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            client_id,
            user_id,
            created_at: now,
            expires_at: now + Duration::seconds(expires_in),
            refresh_expires_at: None,
            revoked: false,
        }
    }

    pub fn with_refresh_expiry(mut self, refresh_expires_at: DateTime<Utc>) -> Self {
        self.refresh_expires_at = Some(refresh_expires_at);
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.revoked && self.expires_at > Utc::now()
    }

    pub fn is_refreshable(&self) -> bool {
        !self.revoked
            && self.refresh_token.is_some()
            && self
                .refresh_expires_at
                .map(|at| at > Utc::now())
                .unwrap_or(false)
    }
}

/// RFC 6749 section 5.1 token response.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
            scope: token.scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid() {
        let token = Token::new("a".into(), None, "c".into(), None, "read".into(), 60);
        assert!(token.is_valid());
        assert!(!token.is_refreshable());
    }

    #[test]
    fn revoked_or_expired_token_is_invalid() {
        let mut token = Token::new("a".into(), None, "c".into(), None, "read".into(), 60);
        token.revoked = true;
        assert!(!token.is_valid());

        let expired = Token::new("b".into(), None, "c".into(), None, "read".into(), -1);
        assert!(!expired.is_valid());
    }

    #[test]
    fn refresh_window_is_independent_of_access_expiry() {
        let token = Token::new(
            "a".into(),
            Some("r".into()),
            "c".into(),
            Some("u".into()),
            "read".into(),
            -10,
        )
        .with_refresh_expiry(Utc::now() + Duration::hours(1));
        assert!(!token.is_valid());
        assert!(token.is_refreshable());
    }
}
