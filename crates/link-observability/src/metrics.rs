use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

const HTTP_LABELS: &[&str] = &["method", "route", "status"];

/// Prometheus collectors for HTTP traffic and account/OAuth outcomes.
///
/// Cheap to clone; every clone shares the same registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_total_by_route: IntCounterVec,
    pub http_request_duration_seconds_by_route: HistogramVec,

    pub oauth_codes_issued_total: IntCounter,
    /// Labelled by `grant_type`.
    pub oauth_tokens_issued_total: IntCounterVec,
    pub oauth_tokens_refreshed_total: IntCounter,
    /// Labelled by `outcome` (`success` / `failure`).
    pub account_logins_total: IntCounterVec,
    pub account_registrations_total: IntCounter,
    pub verification_emails_sent_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::with_opts(Opts::new("http_requests_total", "Total HTTP requests"))?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_total_by_route = IntCounterVec::new(
            Opts::new(
                "http_requests_by_route_total",
                "HTTP requests by method, route and status",
            ),
            HTTP_LABELS,
        )?;
        let http_request_duration_seconds_by_route = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_by_route_seconds",
                "HTTP request latency by method, route and status",
            ),
            HTTP_LABELS,
        )?;

        let oauth_codes_issued_total = IntCounter::with_opts(Opts::new(
            "oauth_authorization_codes_issued_total",
            "Authorization codes issued",
        ))?;
        let oauth_tokens_issued_total = IntCounterVec::new(
            Opts::new("oauth_tokens_issued_total", "Access tokens issued"),
            &["grant_type"],
        )?;
        let oauth_tokens_refreshed_total = IntCounter::with_opts(Opts::new(
            "oauth_tokens_refreshed_total",
            "Refresh token rotations",
        ))?;
        let account_logins_total = IntCounterVec::new(
            Opts::new("account_logins_total", "Login attempts"),
            &["outcome"],
        )?;
        let account_registrations_total = IntCounter::with_opts(Opts::new(
            "account_registrations_total",
            "Accounts registered",
        ))?;
        let verification_emails_sent_total = IntCounter::with_opts(Opts::new(
            "account_verification_emails_sent_total",
            "Verification emails handed to the mailer",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_total_by_route.clone()))?;
        registry.register(Box::new(http_request_duration_seconds_by_route.clone()))?;
        registry.register(Box::new(oauth_codes_issued_total.clone()))?;
        registry.register(Box::new(oauth_tokens_issued_total.clone()))?;
        registry.register(Box::new(oauth_tokens_refreshed_total.clone()))?;
        registry.register(Box::new(account_logins_total.clone()))?;
        registry.register(Box::new(account_registrations_total.clone()))?;
        registry.register(Box::new(verification_emails_sent_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_total_by_route,
            http_request_duration_seconds_by_route,
            oauth_codes_issued_total,
            oauth_tokens_issued_total,
            oauth_tokens_refreshed_total,
            account_logins_total,
            account_registrations_total,
            verification_emails_sent_total,
        })
    }

    pub fn record_login(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.account_logins_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_token_issued(&self, grant_type: &str) {
        self.oauth_tokens_issued_total
            .with_label_values(&[grant_type])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_prometheus_text;

    #[test]
    fn registries_are_independent_per_instance() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.account_registrations_total.inc();
        assert_eq!(a.account_registrations_total.get(), 1);
        assert_eq!(b.account_registrations_total.get(), 0);
    }

    #[test]
    fn labelled_counters_show_up_in_the_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_login(true);
        metrics.record_login(false);
        metrics.record_login(false);
        metrics.record_token_issued("authorization_code");

        let text = String::from_utf8(encode_prometheus_text(&metrics.registry).unwrap()).unwrap();
        assert!(text.contains(r#"account_logins_total{outcome="failure"} 2"#));
        assert!(text.contains(r#"account_logins_total{outcome="success"} 1"#));
        assert!(text.contains(r#"oauth_tokens_issued_total{grant_type="authorization_code"} 1"#));
    }
}
