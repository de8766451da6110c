use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, Addr};
use actix_web::web;

use link_actix::actors::{AccountActor, AccountSettings, AuthActor, ClientActor, TokenActor, TokenLifetimes};
use link_actix::strategies::{FormClientInfoResolver, LoginTokenAuthorizer};
use link_actix::{handlers, LoginTokenVerifier, OAuthServer};
use link_config::Config;
use link_observability::{Metrics, ObservedStorage};
use link_ports::{
    DynClientStore, DynEphemeralStore, DynMailer, DynStorage, DynTokenStore, DynUserStore,
};

/// Started actors and shared handles, ready to be registered on an `App`.
///
/// Must be created inside a running actix system.
#[derive(Clone)]
pub struct Services {
    storage: DynStorage,
    users: DynUserStore,
    client_actor: Addr<ClientActor>,
    account_actor: Addr<AccountActor>,
    oauth: web::Data<OAuthServer>,
    verifier: LoginTokenVerifier,
    metrics: Metrics,
}

impl Services {
    pub fn start(
        config: &Config,
        storage: Arc<ObservedStorage>,
        kv: DynEphemeralStore,
        mailer: DynMailer,
        metrics: Metrics,
    ) -> Self {
        let clients: DynClientStore = storage.clone();
        let tokens: DynTokenStore = storage.clone();
        let users: DynUserStore = storage.clone();

        let client_actor = ClientActor::new(clients.clone()).start();
        let auth_actor = AuthActor::new(tokens.clone(), config.oauth.code_ttl_secs).start();
        let token_actor = TokenActor::new(
            tokens.clone(),
            config.jwt.secret.clone(),
            TokenLifetimes {
                access_ttl_secs: config.oauth.access_token_ttl_secs,
                refresh_ttl_secs: config.oauth.refresh_token_ttl_secs,
            },
        )
        .start();

        let verifier = LoginTokenVerifier::new(kv.clone(), config.jwt.secret.clone());

        let account_actor = AccountActor::new(
            users.clone(),
            kv,
            mailer,
            AccountSettings {
                jwt_secret: config.jwt.secret.clone(),
                login_token_ttl_secs: config.jwt.login_token_ttl_secs,
                verification_ttl: Duration::from_secs(config.account.verification_ttl_secs),
                email_subject: config.email.subject.clone(),
            },
        )
        .with_metrics(metrics.clone())
        .start();

        let oauth = OAuthServer::new(
            client_actor.clone(),
            auth_actor,
            token_actor,
            Arc::new(FormClientInfoResolver::new(tokens, clients)),
            Arc::new(LoginTokenAuthorizer::new(verifier.clone())),
        )
        .with_metrics(metrics.clone());

        Self {
            storage,
            users,
            client_actor,
            account_actor,
            oauth: web::Data::new(oauth),
            verifier,
            metrics,
        }
    }

    /// Attach application data and every route.
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.storage.clone()))
            .app_data(web::Data::new(self.users.clone()))
            .app_data(web::Data::new(self.client_actor.clone()))
            .app_data(web::Data::new(self.account_actor.clone()))
            .app_data(self.oauth.clone())
            .app_data(web::Data::new(self.verifier.clone()))
            .app_data(web::Data::new(self.metrics.clone()));
        handlers::configure(cfg);
    }
}
