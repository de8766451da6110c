//! Registration and login endpoints.
//!
//! Registration is a four-step flow: request a ticket for an email, have a
//! code mailed, confirm the code, then set a password.

use actix::Addr;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use link_core::{ApiError, ApiResponse};

use crate::actors::{
    AccountActor, CheckVerifyCode, GetUser, Login, Logout, Register, SendVerifyCode, VerifyAccount,
};
use crate::auth::AuthenticatedUser;

fn actor_unavailable(err: actix::MailboxError) -> ApiError {
    ApiError::internal(format!("account actor mailbox: {err}"))
}

fn required(value: &str, name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::param(format!("{name} is required")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct VerifyAccountQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketForm {
    #[serde(default)]
    pub ticket: String,
}

#[derive(Debug, Deserialize)]
pub struct CaptchaForm {
    #[serde(default)]
    pub ticket: String,
    #[serde(default)]
    pub captcha: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub ticket: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn verify_account(
    query: web::Query<VerifyAccountQuery>,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    required(&query.username, "username")?;

    let ticket = account
        .send(VerifyAccount {
            username: query.username,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "ticket": ticket }))))
}

pub async fn send_email(
    form: web::Form<TicketForm>,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    required(&form.ticket, "ticket")?;

    account
        .send(SendVerifyCode {
            ticket: form.ticket,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

pub async fn check_captcha(
    form: web::Form<CaptchaForm>,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    required(&form.ticket, "ticket")?;
    required(&form.captcha, "captcha")?;

    account
        .send(CheckVerifyCode {
            ticket: form.ticket,
            captcha: form.captcha,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

pub async fn register(
    form: web::Form<RegisterForm>,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    required(&form.ticket, "ticket")?;
    required(&form.password, "password")?;

    let info = account
        .send(Register {
            ticket: form.ticket,
            password: form.password,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(info)))
}

pub async fn login(
    form: web::Form<LoginForm>,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    required(&form.username, "username")?;
    required(&form.password, "password")?;

    let token = account
        .send(Login {
            username: form.username,
            password: form.password,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "token": token }))))
}

pub async fn logout(
    user: AuthenticatedUser,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    account
        .send(Logout {
            uid: user.0,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::ok()))
}

pub async fn user_info(
    user: AuthenticatedUser,
    account: web::Data<Addr<AccountActor>>,
) -> Result<HttpResponse, ApiError> {
    let info = account
        .send(GetUser {
            uid: user.0,
            span: tracing::Span::current(),
        })
        .await
        .map_err(actor_unavailable)??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(info)))
}
