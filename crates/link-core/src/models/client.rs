use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// A registered OAuth consumer application.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Registered redirect domain; redirect URIs must live under it.
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(client_id: String, client_secret: String, domain: String) -> Self {
        Self {
            client_id,
            client_secret,
            domain,
            created_at: Utc::now(),
        }
    }

    /// Check that `redirect_uri` points at the registered domain or one of its subdomains.
    pub fn accepts_redirect_uri(&self, redirect_uri: &str) -> bool {
        let Ok(redirect) = Url::parse(redirect_uri) else {
            return false;
        };
        if redirect.fragment().is_some() {
            return false;
        }
        let Some(redirect_host) = redirect.host_str() else {
            return false;
        };

        let domain = self.domain.trim();
        // Domains may be registered without a scheme, e.g. `example.com:8080`,
        // which `Url` would otherwise read as scheme `example.com`.
        let base = Url::parse(domain)
            .ok()
            .filter(Url::has_host)
            .or_else(|| Url::parse(&format!("http://{domain}")).ok());
        let Some(domain_host) = base
            .as_ref()
            .and_then(Url::host_str)
            .map(str::to_ascii_lowercase)
        else {
            return false;
        };

        let redirect_host = redirect_host.to_ascii_lowercase();
        redirect_host == domain_host || redirect_host.ends_with(&format!(".{domain_host}"))
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(domain: &str) -> Client {
        Client::new("c".into(), "s".into(), domain.into())
    }

    #[test]
    fn accepts_same_host_and_subdomains() {
        let c = client("https://example.com");
        assert!(c.accepts_redirect_uri("https://example.com/cb"));
        assert!(c.accepts_redirect_uri("https://app.example.com/oauth/cb?x=1"));
    }

    #[test]
    fn rejects_lookalike_hosts() {
        let c = client("https://example.com");
        assert!(!c.accepts_redirect_uri("https://evilexample.com/cb"));
        assert!(!c.accepts_redirect_uri("https://example.com.evil.io/cb"));
    }

    #[test]
    fn rejects_fragments_and_garbage() {
        let c = client("https://example.com");
        assert!(!c.accepts_redirect_uri("https://example.com/cb#frag"));
        assert!(!c.accepts_redirect_uri("not a uri"));
    }

    #[test]
    fn accepts_bare_domain_registration() {
        let c = client("example.com");
        assert!(c.accepts_redirect_uri("http://example.com/cb"));
    }

    #[test]
    fn accepts_bare_domain_with_port() {
        let c = client("example.com:8080");
        assert!(c.accepts_redirect_uri("http://example.com:8080/cb"));
        assert!(c.accepts_redirect_uri("https://app.example.com/cb"));
        assert!(!c.accepts_redirect_uri("https://evil.org/cb"));
    }
}
