use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A short-lived authorization code awaiting exchange at the token endpoint.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub id: String,
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl AuthorizationCode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: String,
        client_id: String,
        user_id: String,
        redirect_uri: String,
        scope: String,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            client_id,
            user_id,
            redirect_uri,
            scope,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            used: false,
            code_challenge,
            code_challenge_method,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.used && self.expires_at > Utc::now()
    }
}

/// Verify a PKCE `code_verifier` against the stored challenge (RFC 7636).
pub fn validate_pkce(challenge: &str, verifier: &str, method: &str) -> bool {
    match method {
        "plain" => challenge == verifier,
        "S256" => {
            use base64::{engine::general_purpose, Engine as _};
            use sha2::{Digest, Sha256};

            let mut hasher = Sha256::new();
            hasher.update(verifier.as_bytes());
            let result = hasher.finalize();
            let encoded = general_purpose::URL_SAFE_NO_PAD.encode(result);
            challenge == encoded
        }
        _ => false,
    }
}
