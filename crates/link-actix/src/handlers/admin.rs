use actix_web::{web, HttpResponse, Result};

use link_observability::Metrics;
use link_ports::DynStorage;

pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("pong")
}

/// Health check endpoint
pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "sast_link",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Readiness check endpoint
pub async fn readiness(db: web::Data<DynStorage>) -> Result<HttpResponse> {
    if let Err(err) = db.healthcheck().await {
        tracing::warn!(error = %err, "readiness check failed");
        return Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unavailable",
            "checks": {
                "database": "failed"
            }
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ready",
        "checks": {
            "database": "ok"
        }
    })))
}

/// Prometheus text exposition of the service registry.
pub async fn metrics(metrics: web::Data<Metrics>) -> Result<HttpResponse> {
    let buffer = link_observability::encode_prometheus_text(&metrics.registry)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer))
}
