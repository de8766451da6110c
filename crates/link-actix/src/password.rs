//! Password policy and Argon2id hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 64;

/// 6 to 64 characters with at least one ASCII letter and one digit.
pub fn password_is_legal(password: &str) -> bool {
    let len = password.chars().count();
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len)
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Unparseable hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("sast2024").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("sast2024", &hash));
        assert!(!verify_password("sast2025", &hash));
        assert!(!verify_password("sast2024", "not-a-hash"));
    }

    #[test]
    fn password_policy() {
        assert!(password_is_legal("abc123"));
        assert!(!password_is_legal("abc12"));
        assert!(!password_is_legal("abcdefgh"));
        assert!(!password_is_legal("12345678"));
        assert!(!password_is_legal(&format!("a1{}", "x".repeat(63))));
    }
}
