//! Password hashing and verification (Argon2id, PHC string format).

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// One-way, salted password hashing.
///
/// `hash` never returns the same string twice for one password (fresh salt per
/// call). `verify` answers "no match" for malformed stored hashes instead of
/// failing.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;
    fn verify(&self, password_hash: &str, candidate: &str) -> bool;

    /// A valid hash of an unguessable value, made with the current parameters.
    ///
    /// Verifying against it costs the same as a real check and never matches.
    fn decoy_hash(&self) -> &str;
}

/// Argon2id cost parameters applied to newly created hashes.
///
/// Existing hashes are always verified with the parameters embedded in them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_memory_kib")]
    pub argon2_memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub argon2_iterations: u32,
    #[serde(default = "default_parallelism")]
    pub argon2_parallelism: u32,
}

fn default_memory_kib() -> u32 {
    Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    Params::DEFAULT_P_COST
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: default_memory_kib(),
            argon2_iterations: default_iterations(),
            argon2_parallelism: default_parallelism(),
        }
    }
}

/// Argon2id-backed [`CredentialVerifier`].
#[derive(Clone)]
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
    decoy: String,
}

impl Argon2Verifier {
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        // The salt doubles as the secret: it is random and never leaves the process.
        let salt = SaltString::generate(&mut OsRng);
        let decoy = argon2
            .hash_password(salt.as_str().as_bytes(), &SaltString::generate(&mut OsRng))
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();

        Ok(Self { argon2, decoy })
    }
}

impl core::fmt::Debug for Argon2Verifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Argon2Verifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(phc.to_string())
    }

    fn verify(&self, password_hash: &str, candidate: &str) -> bool {
        // Output comparison inside `verify_password` is constant-time.
        match PasswordHash::new(password_hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn decoy_hash(&self) -> &str {
        &self.decoy
    }
}
