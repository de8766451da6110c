//! Actix-web HTTP surface for SAST Link.
//!
//! Framework-specific code lives here: actors, the OAuth engine that drives them,
//! the strategy implementations it is configured with, and the HTTP handlers.
//! Domain types live in `link-core`; storage is abstracted behind `link-ports`.

pub mod actors;
pub mod auth;
pub mod engine;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod session;
pub mod strategies;

pub use auth::{AuthenticatedUser, LoginTokenVerifier};
pub use engine::{AuthorizeOutcome, OAuthServer};
pub use session::ActixSessionStore;
