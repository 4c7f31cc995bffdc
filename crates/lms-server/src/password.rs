//! Credential hashing.
//!
//! Hashes are PBKDF2-HMAC-SHA256 in PHC string form,
//! `$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`, so the rounds and salt
//! travel with every stored credential.

use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use rand::RngCore;

use crate::error::Error;

/// PBKDF2 rounds for new credentials.
pub const DEFAULT_ROUNDS: u32 = 100_000;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Derived key length in bytes.
const OUTPUT_LEN: usize = 32;

/// Hash a plain-text password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, Error> {
    hash_with_rounds(plain, DEFAULT_ROUNDS)
}

/// Check a plain-text password against a PHC hash.
///
/// Malformed hashes never verify.
pub fn verify_password(plain: &str, encoded: &str) -> bool {
    PasswordHash::new(encoded)
        .and_then(|hash| Pbkdf2.verify_password(plain.as_bytes(), &hash))
        .is_ok()
}

fn hash_with_rounds(plain: &str, rounds: u32) -> Result<String, Error> {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes)?;

    let params = Params {
        rounds,
        output_length: OUTPUT_LEN,
    };
    let hash = Pbkdf2.hash_password_customized(
        plain.as_bytes(),
        Some(Algorithm::Pbkdf2Sha256.ident()),
        None,
        params,
        &salt,
    )?;
    Ok(hash.to_string())
}
