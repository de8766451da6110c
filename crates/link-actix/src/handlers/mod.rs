pub mod account;
pub mod admin;
pub mod client;
pub mod oauth;

use actix_web::{
    http::header::{self, HeaderValue},
    web, HttpResponse,
};

use link_core::ApiError;

/// Register every API route.
///
/// Application data (actor addresses, [`crate::OAuthServer`], the
/// [`crate::LoginTokenVerifier`], metrics and storage) is expected on the `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ping", web::get().to(admin::ping))
        .route("/health", web::get().to(admin::health))
        .route("/ready", web::get().to(admin::readiness))
        .route("/metrics", web::get().to(admin::metrics))
        .service(
            web::scope("/api/v1")
                .app_data(
                    web::FormConfig::default()
                        .error_handler(|err, _| ApiError::param(err.to_string()).into()),
                )
                .app_data(
                    web::QueryConfig::default()
                        .error_handler(|err, _| ApiError::param(err.to_string()).into()),
                )
                .service(
                    web::scope("/oauth2")
                        .service(
                            web::resource("/authorize")
                                .route(web::get().to(oauth::authorize))
                                .route(web::post().to(oauth::authorize)),
                        )
                        .route("/token", web::post().to(oauth::token))
                        .route("/refresh", web::post().to(oauth::refresh))
                        .route("/userinfo", web::get().to(oauth::userinfo))
                        .route("/create-client", web::post().to(client::create_client)),
                )
                .route("/verify/account", web::get().to(account::verify_account))
                .route("/sendEmail", web::post().to(account::send_email))
                .route("/verify/captcha", web::post().to(account::check_captcha))
                .route("/user/register", web::post().to(account::register))
                .route("/user/login", web::post().to(account::login))
                .route("/user/logout", web::post().to(account::logout))
                .route("/user/info", web::get().to(account::user_info)),
        );
}

pub(crate) fn no_store_headers(mut resp: HttpResponse) -> HttpResponse {
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    resp.headers_mut()
        .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    resp
}

pub(crate) fn auth_response_security_headers(mut resp: HttpResponse) -> HttpResponse {
    let headers = resp.headers_mut();
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("frame-ancestors 'none'"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    resp
}
