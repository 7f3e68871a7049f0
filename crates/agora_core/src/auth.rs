//! Password hashing and API token generation.
//!
//! # Invariants
//! - Stored hashes are Argon2id PHC strings with a random salt.
//! - Token keys are 40 lowercase hex characters.

use crate::model::ValidationError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const PASSWORD_MIN_CHARS: usize = 8;
pub const TOKEN_KEY_LEN: usize = 40;

/// Failure inside the password hashing primitive.
#[derive(Debug)]
pub enum AuthError {
    Hash(String),
    /// Stored hash is not a parseable PHC string.
    MalformedHash(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash(message) => write!(f, "password hashing failed: {message}"),
            Self::MalformedHash(message) => write!(f, "stored password hash is malformed: {message}"),
        }
    }
}

impl Error for AuthError {}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

/// Returns `Ok(false)` on mismatch; errors only when `hash` is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|err| AuthError::MalformedHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::new(
            "password",
            format!("this password is too short; it must contain at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password", "this password is entirely numeric"));
    }
    Ok(())
}

pub fn generate_token_key() -> String {
    let mut key = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    key.truncate(TOKEN_KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrip_accepts_only_the_original_password() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).expect("verify"));
        assert!(!verify_password("battery staple", &hash).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AuthError::MalformedHash(_))
        ));
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("1234567890").is_err());
        assert!(validate_password("s3cure-enough").is_ok());
    }

    #[test]
    fn token_keys_are_40_lowercase_hex_chars() {
        let key = generate_token_key();
        assert_eq!(key.len(), TOKEN_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_token_key());
    }
}
