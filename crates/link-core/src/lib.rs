//! Framework-agnostic domain types for the SAST Link account service.
//!
//! Storage adapters, the actix HTTP layer and the server binary all share these
//! types; nothing in here performs I/O.

pub mod keys;
pub mod models;

pub use models::*;
