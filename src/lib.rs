//! Library exports.
//!
//! The service is split into workspace crates; this facade re-exports them so
//! extra binaries and the integration tests have a single entry point.

pub use link_actix as http;
pub use link_config as config;
pub use link_core as domain;
pub use link_kv as kv;
pub use link_mail as mail;
pub use link_observability as observability;
pub use link_openapi::ApiDoc;
pub use link_ports as ports;
pub use link_server::{run, session_key, Services};
pub use link_storage_factory as storage;
