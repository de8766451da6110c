//! Integration ports for SAST Link.
//!
//! Implement these traits in your own crate to plug in custom persistence,
//! mail delivery or session handling without forking the server.

pub mod ephemeral;
pub mod mail;
pub mod session;
pub mod storage;
pub mod strategy;

pub use ephemeral::*;
pub use mail::*;
pub use session::*;
pub use storage::*;
pub use strategy::*;
