use actix_session::Session;
use actix_web::{http::header, web, HttpRequest, HttpResponse};

use link_core::{ApiError, ApiResponse, ErrorCode, FormParams, OAuth2Error, OAuthUserInfo, TokenResponse};
use link_ports::{DynUserStore, SessionStore};

use super::{auth_response_security_headers, no_store_headers};
use crate::auth::bearer_token;
use crate::engine::{AuthorizeOutcome, OAuthServer};
use crate::session::ActixSessionStore;

/// Query string plus form body, each rejecting duplicates.
///
/// A key present in both is ambiguous and rejected as well.
fn request_params(req: &HttpRequest, body: &[u8]) -> Result<FormParams, OAuth2Error> {
    let mut params = FormParams::parse_no_dupes(req.query_string().as_bytes())?;
    let body = FormParams::parse_no_dupes(body)?;
    if body.iter().any(|(key, _)| params.get(key).is_some()) {
        return Err(OAuth2Error::invalid_request(
            "Duplicate parameters are not allowed",
        ));
    }
    params.merge(body);
    Ok(params)
}

/// OAuth2 authorize endpoint.
///
/// A request parked in the session by an earlier login redirect is replayed
/// with the freshly supplied `token`.
pub async fn authorize(
    req: HttpRequest,
    body: web::Bytes,
    session: Session,
    server: web::Data<OAuthServer>,
) -> Result<HttpResponse, ApiError> {
    let mut form = request_params(&req, &body)?;
    let session = ActixSessionStore(session);

    if let Some(mut saved) = session.get_return_form()? {
        tracing::debug!("replaying parked authorization request");
        match form.remove("token") {
            Some(token) => saved.insert("token", token),
            None => {
                saved.remove("token");
            }
        }
        form = saved;
    }
    session.remove_return_form();

    match server.handle_authorize_request(&form, &session).await? {
        AuthorizeOutcome::Redirect(location) => Ok(auth_response_security_headers(
            no_store_headers(
                HttpResponse::Found()
                    .append_header((header::LOCATION, location.to_string()))
                    .finish(),
            ),
        )),
        AuthorizeOutcome::LoginRequired => {
            Ok(HttpResponse::Ok().json(ApiResponse::<()>::failed(ErrorCode::AuthError)))
        }
    }
}

async fn exchange(
    req: &HttpRequest,
    body: &[u8],
    server: &OAuthServer,
    default_grant: Option<&str>,
) -> Result<HttpResponse, OAuth2Error> {
    let mut form = request_params(req, body)?;
    if let Some(grant_type) = default_grant {
        if form.get_non_empty("grant_type").is_none() {
            form.insert("grant_type", grant_type);
        }
    }

    let token = server.handle_token_request(&form).await?;
    Ok(no_store_headers(
        HttpResponse::Ok().json(TokenResponse::from(token)),
    ))
}

/// OAuth2 token endpoint.
pub async fn token(
    req: HttpRequest,
    body: web::Bytes,
    server: web::Data<OAuthServer>,
) -> Result<HttpResponse, ApiError> {
    Ok(exchange(&req, &body, &server, None).await?)
}

/// Refresh endpoint. `grant_type` defaults to `refresh_token`.
pub async fn refresh(
    req: HttpRequest,
    body: web::Bytes,
    server: web::Data<OAuthServer>,
) -> Result<HttpResponse, ApiError> {
    exchange(&req, &body, &server, Some("refresh_token"))
        .await
        .map_err(|err| ApiError::from_oauth(err, ErrorCode::RefreshTokenError))
}

/// Resource-owner lookup for a bearer access token. Scope is not enforced.
pub async fn userinfo(
    req: HttpRequest,
    server: web::Data<OAuthServer>,
    users: web::Data<DynUserStore>,
) -> Result<HttpResponse, ApiError> {
    let Some(access_token) = bearer_token(&req) else {
        return Err(ApiError::failed(ErrorCode::AccessTokenError));
    };

    let token = match server.load_access_token(access_token).await {
        Ok(token) => token,
        Err(err) if err.is_server_error() => return Err(ApiError::internal(err)),
        Err(_) => return Err(ApiError::failed(ErrorCode::AccessTokenError)),
    };

    let Some(uid) = token.user_id.as_deref() else {
        // Client-credentials tokens have no resource owner.
        return Err(ApiError::failed(ErrorCode::UserInfoFail));
    };

    match users.get_user_by_uid(uid).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(ApiResponse::success(OAuthUserInfo::from(&user)))),
        Ok(None) => Err(ApiError::failed(ErrorCode::UserInfoFail)),
        Err(err) => {
            tracing::error!(uid, error = %err, "userinfo lookup failed");
            Err(ApiError::failed(ErrorCode::UserInfoFail))
        }
    }
}
