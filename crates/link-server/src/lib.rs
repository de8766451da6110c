//! Server assembly: configuration, storage, actors and the HTTP server.

mod services;

pub use services::Services;

use actix_cors::Cors;
use actix_session::{config::CookieContentSecurity, storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware, App, HttpServer};
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use link_actix::middleware::MetricsMiddleware;
use link_config::{Config, SessionConfig};
use link_observability::{init_telemetry, shutdown_telemetry, Metrics};
use link_openapi::ApiDoc;

const SERVICE_NAME: &str = "sast_link";

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {err}"))
}

/// Cookie signing/encryption key from `session.key` (hex, at least 64 bytes).
///
/// Without a configured key a random one is generated, so sessions do not
/// survive a restart.
pub fn session_key(config: &SessionConfig) -> std::io::Result<Key> {
    match config.key.as_deref() {
        Some(encoded) => {
            let bytes = hex::decode(encoded.trim())
                .map_err(|e| io_error("session.key is not valid hex", e))?;
            Key::try_from(bytes.as_slice())
                .map_err(|e| io_error("session.key must decode to at least 64 bytes", e))
        }
        None => {
            tracing::warn!("session.key not set; generating an ephemeral session key");
            Ok(Key::generate())
        }
    }
}

/// Load configuration, connect the backends and serve until shutdown.
pub async fn run() -> std::io::Result<()> {
    let telemetry =
        init_telemetry(SERVICE_NAME).map_err(|e| io_error("failed to initialise telemetry", e))?;

    let config = Config::default();
    tracing::info!(config = ?config.sanitized(), "configuration loaded");
    if let Err(err) = config.validate_for_production() {
        tracing::warn!(error = %err, "configuration is not production ready");
    }

    let storage = link_storage_factory::create_storage(&config.database.url)
        .await
        .map_err(|e| io_error("failed to connect to database", e))?;
    link_ports::Storage::init(storage.as_ref())
        .await
        .map_err(|e| io_error("failed to initialise database schema", e))?;

    let kv = link_kv::create_ephemeral_store(config.redis.url.as_deref())
        .await
        .map_err(|e| io_error("failed to connect to key-value store", e))?;
    let mailer = link_mail::create_mailer(&config.email)
        .map_err(|e| io_error("failed to configure mailer", e))?;
    let metrics = Metrics::new().map_err(|e| io_error("failed to register metrics", e))?;

    let services = Services::start(&config, storage, kv, mailer, metrics.clone());
    let key = session_key(&config.session)?;
    let session = config.session.clone();
    let openapi = ApiDoc::openapi();

    let (host, port) = config.bind_address();
    tracing::info!(%host, port, "starting HTTP server");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_name(session.cookie_name.clone())
                    .cookie_secure(session.secure)
                    .cookie_content_security(CookieContentSecurity::Private)
                    .build(),
            )
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(["GET", "POST"])
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(MetricsMiddleware::new(metrics.clone()))
            .wrap(middleware::NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(|cfg| services.register(cfg))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.as_str(), port))?
    .run();

    let result = server.await;
    shutdown_telemetry(telemetry);
    result
}
