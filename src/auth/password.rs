//! Argon2id password hashing. Hashes are stored as PHC strings, so the salt
//! and cost parameters travel with each hash.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;

pub use argon2::password_hash::Error as HashError;

lazy_static! {
    /// Hash checked when a login names no account, so an unknown email
    /// costs as much as a wrong password.
    static ref DUMMY_HASH: Result<String, HashError> = hash_password("recipe-api-unknown-account");
}

pub fn hash_password(plain: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}

/// `Ok(false)` on a mismatch; `Err` only when `hash` is not a usable PHC string.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Runs one verification against a fixed hash and discards the outcome.
pub fn verify_dummy(plain: &str) {
    if let Ok(hash) = DUMMY_HASH.as_ref() {
        let _ = verify_password(plain, hash);
    }
}
