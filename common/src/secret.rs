use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString},
};
use base64::{Engine, engine::general_purpose};
use rand::RngCore;

use crate::error::{AppError, Res};

/// Random bytes behind a customer code.
pub const CUSTOMER_CODE_BYTES: usize = 16;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Generates an unguessable, URL-safe token from `len` random bytes.
pub fn generate_token(len: usize) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes(len))
}

/// Generates a fresh customer code.
pub fn generate_customer_code() -> String {
    generate_token(CUSTOMER_CODE_BYTES)
}

/// Hashes `secret` into an argon2 PHC string with a fresh salt.
pub fn hash_secret(secret: &str) -> Res<String> {
    let salt = SaltString::encode_b64(&random_bytes(16))
        .map_err(|e| AppError::Internal(format!("Failed to encode salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash secret: {}", e)))?;
    Ok(hash.to_string())
}

/// Produces a salted password nobody knows the plaintext of.
pub fn generate_unusable_password() -> Res<String> {
    hash_secret(&generate_token(32))
}

/// Compares two secrets without short-circuiting on the first differing byte.
pub fn secrets_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
