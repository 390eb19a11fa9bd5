//! Argon2id password hashing and verification
//!
//! Digests are raw byte strings rather than PHC strings:
//!
//! ```text
//! [0..2)   time cost      (u16, big endian)
//! [2..4)   parallelism    (u16, big endian)
//! [4..8)   memory in KiB  (u32, big endian)
//! [8..24)  salt
//! [24..)   derived key
//! ```
//!
//! The header lets [`PasswordHasher::verify`] re-derive a key with the
//! parameters the digest was produced under, even if the defaults change.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{RngCore, rngs::OsRng};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;
/// Derived key length in bytes
pub const KEY_LEN: usize = 32;

const HEADER_LEN: usize = 8;
const SALT_END: usize = HEADER_LEN + SALT_LEN;

/// Errors raised while hashing a password
#[derive(Error, Debug)]
pub enum PasswordError {
    /// The Argon2 parameters were rejected
    #[error("invalid argon2 parameters: {0}")]
    Params(String),

    /// Key derivation failed
    #[error("key derivation failed: {0}")]
    Derive(String),
}

/// Stateless Argon2id hasher
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    time_cost: u16,
    parallelism: u16,
    memory_kib: u32,
}

impl Default for PasswordHasher {
    /// Time cost 1, 64 MiB of memory, 4 lanes.
    fn default() -> Self {
        Self {
            time_cost: 1,
            parallelism: 4,
            memory_kib: 64 * 1024,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with explicit cost parameters
    pub fn with_params(time_cost: u16, memory_kib: u32, parallelism: u16) -> Self {
        Self {
            time_cost,
            parallelism,
            memory_kib,
        }
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<Vec<u8>, PasswordError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = derive(
            password,
            &salt,
            self.time_cost,
            self.memory_kib,
            self.parallelism,
            KEY_LEN,
        )?;

        let mut digest = Vec::with_capacity(SALT_END + KEY_LEN);
        digest.extend_from_slice(&self.time_cost.to_be_bytes());
        digest.extend_from_slice(&self.parallelism.to_be_bytes());
        digest.extend_from_slice(&self.memory_kib.to_be_bytes());
        digest.extend_from_slice(&salt);
        digest.extend_from_slice(&key);
        Ok(digest)
    }

    /// Check a password against a stored digest.
    ///
    /// Malformed digests never verify.
    pub fn verify(&self, password: &str, digest: &[u8]) -> bool {
        if digest.len() <= SALT_END {
            return false;
        }

        let time_cost = u16::from_be_bytes([digest[0], digest[1]]);
        let parallelism = u16::from_be_bytes([digest[2], digest[3]]);
        let memory_kib = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]);
        let salt = &digest[HEADER_LEN..SALT_END];
        let stored_key = &digest[SALT_END..];

        match derive(
            password,
            salt,
            time_cost,
            memory_kib,
            parallelism,
            stored_key.len(),
        ) {
            Ok(key) => key.ct_eq(stored_key).into(),
            Err(_) => false,
        }
    }

    /// Burn one key derivation so unknown accounts cost as much as known ones.
    pub fn verify_dummy(&self, password: &str) {
        let mut digest = Vec::with_capacity(SALT_END + KEY_LEN);
        digest.extend_from_slice(&self.time_cost.to_be_bytes());
        digest.extend_from_slice(&self.parallelism.to_be_bytes());
        digest.extend_from_slice(&self.memory_kib.to_be_bytes());
        digest.resize(SALT_END + KEY_LEN, 0);
        let _ = self.verify(password, &digest);
    }
}

fn derive(
    password: &str,
    salt: &[u8],
    time_cost: u16,
    memory_kib: u32,
    parallelism: u16,
    key_len: usize,
) -> Result<Vec<u8>, PasswordError> {
    let params = Params::new(
        memory_kib,
        u32::from(time_cost),
        u32::from(parallelism),
        Some(key_len),
    )
    .map_err(|e| PasswordError::Params(e.to_string()))?;

    let mut key = vec![0u8; key_len];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| PasswordError::Derive(e.to_string()))?;
    Ok(key)
}
