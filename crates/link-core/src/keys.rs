//! Key layout for ephemeral records in the key-value store.
//!
//! Every key is `<PREFIX>:<username>`; the username is the email address during
//! registration and the uid once an account exists.

pub const TICKET_PREFIX: &str = "TICKET";
pub const VERIFY_CODE_PREFIX: &str = "VERIFY_CODE";
pub const VERIFIED_PREFIX: &str = "VERIFIED";
pub const LOGIN_TOKEN_PREFIX: &str = "LOGIN_TOKEN";

pub fn ticket(username: &str) -> String {
    format!("{TICKET_PREFIX}:{username}")
}

pub fn verify_code(username: &str) -> String {
    format!("{VERIFY_CODE_PREFIX}:{username}")
}

pub fn verified(username: &str) -> String {
    format!("{VERIFIED_PREFIX}:{username}")
}

pub fn login_token(username: &str) -> String {
    format!("{LOGIN_TOKEN_PREFIX}:{username}")
}
