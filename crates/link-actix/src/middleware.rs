pub use link_observability::actix::MetricsMiddleware;
