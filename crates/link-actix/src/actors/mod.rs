pub mod account_actor;
pub mod auth_actor;
pub mod client_actor;
pub mod token_actor;

pub use account_actor::*;
pub use auth_actor::*;
pub use client_actor::*;
pub use token_actor::*;

use link_core::OAuth2Error;

/// Map a failed `Addr::send` (actor stopped or mailbox full) to a server error.
pub fn mailbox_error(err: actix::MailboxError) -> OAuth2Error {
    OAuth2Error::server_error(format!("actor mailbox: {err}"))
}

/// Random alphanumeric string from the thread-local CSPRNG.
pub(crate) fn random_alphanumeric(len: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}
