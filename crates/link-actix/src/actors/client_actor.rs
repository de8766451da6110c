use actix::prelude::*;
use link_observability::annotate_span_with_trace_ids;
use link_ports::DynClientStore;
use subtle::ConstantTimeEq;
use tracing::Instrument;
use uuid::Uuid;

use link_core::{Client, OAuth2Error};

use super::random_alphanumeric;

const CLIENT_SECRET_LEN: usize = 32;

pub struct ClientActor {
    clients: DynClientStore,
}

impl ClientActor {
    pub fn new(clients: DynClientStore) -> Self {
        Self { clients }
    }
}

impl Actor for ClientActor {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "Result<Client, OAuth2Error>")]
pub struct RegisterClient {
    /// Redirect domain every authorization request must stay under.
    pub domain: String,
    pub span: tracing::Span,
}

impl Handler<RegisterClient> for ClientActor {
    type Result = ResponseFuture<Result<Client, OAuth2Error>>;

    fn handle(&mut self, msg: RegisterClient, _: &mut Self::Context) -> Self::Result {
        let clients = self.clients.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.client.register",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            domain = %msg.domain
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let client = Client::new(
                    Uuid::new_v4().to_string(),
                    random_alphanumeric(CLIENT_SECRET_LEN),
                    msg.domain,
                );

                clients.save_client(&client).await?;
                tracing::info!(client_id = %client.client_id, "client registered");

                Ok(client)
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<Client, OAuth2Error>")]
pub struct GetClient {
    pub client_id: String,
    pub span: tracing::Span,
}

impl Handler<GetClient> for ClientActor {
    type Result = ResponseFuture<Result<Client, OAuth2Error>>;

    fn handle(&mut self, msg: GetClient, _: &mut Self::Context) -> Self::Result {
        let clients = self.clients.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.client.get",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            client_id = %msg.client_id
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                clients
                    .get_client(&msg.client_id)
                    .await?
                    .ok_or_else(|| OAuth2Error::invalid_client("Client not found"))
            }
            .instrument(actor_span),
        )
    }
}

#[derive(Message)]
#[rtype(result = "Result<bool, OAuth2Error>")]
pub struct ValidateClient {
    pub client_id: String,
    pub client_secret: String,
    pub span: tracing::Span,
}

impl Handler<ValidateClient> for ClientActor {
    type Result = ResponseFuture<Result<bool, OAuth2Error>>;

    fn handle(&mut self, msg: ValidateClient, _: &mut Self::Context) -> Self::Result {
        let clients = self.clients.clone();

        let parent_span = msg.span.clone();
        let actor_span = tracing::info_span!(
            parent: &parent_span,
            "actor.client.validate",
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            client_id = %msg.client_id
        );
        annotate_span_with_trace_ids(&actor_span);

        Box::pin(
            async move {
                let Some(client) = clients.get_client(&msg.client_id).await? else {
                    return Ok(false);
                };

                Ok(client
                    .client_secret
                    .as_bytes()
                    .ct_eq(msg.client_secret.as_bytes())
                    .into())
            }
            .instrument(actor_span),
        )
    }
}
