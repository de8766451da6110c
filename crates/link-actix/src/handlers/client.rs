use actix::Addr;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use link_core::{ApiError, ApiResponse, ClientCredentials};

use crate::actors::{mailbox_error, ClientActor, RegisterClient};

#[derive(Debug, Deserialize)]
pub struct CreateClientForm {
    #[serde(default)]
    pub redirect_uri: String,
}

/// Register an OAuth client for a redirect domain.
///
/// Unauthenticated: anyone who can reach the endpoint can create clients.
pub async fn create_client(
    form: web::Form<CreateClientForm>,
    client_actor: web::Data<Addr<ClientActor>>,
) -> Result<HttpResponse, ApiError> {
    let domain = form.into_inner().redirect_uri.trim().to_string();
    if domain.is_empty() {
        return Err(ApiError::param("redirect_uri is required"));
    }

    let client = client_actor
        .send(RegisterClient {
            domain,
            span: tracing::Span::current(),
        })
        .await
        .map_err(mailbox_error)??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ClientCredentials {
        client_id: client.client_id,
        client_secret: client.client_secret,
    })))
}
