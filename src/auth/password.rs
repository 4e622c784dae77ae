//! Password hashing and verification using Argon2id
//!
//! Unsalted SHA-256 hex digests written by the previous service are accepted only
//! when explicitly enabled, and are compared in constant time.

use crate::error::AppError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of a hex encoded SHA-256 digest
const LEGACY_DIGEST_LEN: usize = 64;

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    accept_legacy: bool,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        Self::with_params(65536, 3, 4)
    }

    /// Create hasher with explicit Argon2 cost parameters
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        let params = Params::new(memory_kib, iterations, parallelism, None).unwrap_or_else(|e| {
            tracing::warn!("Invalid Argon2 params, falling back to defaults: {:?}", e);
            Params::default()
        });

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            accept_legacy: false,
        }
    }

    /// Also accept unsalted SHA-256 hex digests during verification
    pub fn accept_legacy_digests(mut self, accept: bool) -> Self {
        self.accept_legacy = accept;
        self
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored digest
    ///
    /// Unparseable digests never match.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        if let Ok(parsed_hash) = PasswordHash::new(stored) {
            // Argon2 parameters are read from the PHC string itself
            return self
                .argon2
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok();
        }

        if self.accept_legacy && is_legacy_digest(stored) {
            let computed = legacy_digest(password);
            return computed
                .as_bytes()
                .ct_eq(stored.to_ascii_lowercase().as_bytes())
                .into();
        }

        tracing::debug!("Stored password digest has an unsupported format");
        false
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsalted SHA-256 hex digest used by the previous service
pub fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == LEGACY_DIGEST_LEN && stored.bytes().all(|b| b.is_ascii_hexdigit())
}
