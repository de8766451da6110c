use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Public identifier, the local part of the registration email.
    pub uid: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub qq_id: Option<String>,
    pub lark_id: Option<String>,
    pub github_id: Option<String>,
    pub wechat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl User {
    pub fn new(uid: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            uid,
            email,
            password_hash,
            qq_id: None,
            lark_id: None,
            github_id: None,
            wechat_id: None,
            created_at: Utc::now(),
            is_deleted: false,
        }
    }

    /// Derive the uid for a registration email (`B21010101@njupt.edu.cn` -> `b21010101`).
    pub fn uid_from_email(email: &str) -> Option<String> {
        let (local, domain) = email.trim().rsplit_once('@')?;
        if local.is_empty() || domain.is_empty() {
            return None;
        }
        Some(local.to_ascii_lowercase())
    }
}

/// Resource-owner view returned by the OAuth userinfo endpoint.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthUserInfo {
    pub email: String,
    pub user_id: String,
}

/// Account view returned to the logged-in user.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub email: String,
    pub uid: String,
}

impl From<&User> for OAuthUserInfo {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            user_id: user.uid.clone(),
        }
    }
}

impl From<&User> for AccountInfo {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            uid: user.uid.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_lowercased_local_part() {
        assert_eq!(
            User::uid_from_email("B21010101@njupt.edu.cn").as_deref(),
            Some("b21010101")
        );
        assert_eq!(User::uid_from_email("no-at-sign"), None);
        assert_eq!(User::uid_from_email("@njupt.edu.cn"), None);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User::new("u1".into(), "u1@example.com".into(), "secret-hash".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
