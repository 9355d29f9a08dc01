//! Password hashing with pluggable credential verifiers.
//!
//! Stored hashes carry their scheme in the prefix. New hashes are always
//! Argon2id; legacy bcrypt hashes keep verifying and are upgraded lazily.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::Arc;

use crate::config::PasswordConfig;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash scheme, identified by the stored hash prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    Argon2id,
    Bcrypt,
}

impl HashScheme {
    pub fn detect(hash: &str) -> Option<Self> {
        if hash.starts_with("$argon2id$") {
            Some(HashScheme::Argon2id)
        } else if ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p)) {
            Some(HashScheme::Bcrypt)
        } else {
            None
        }
    }
}

/// One hashing scheme. Implementations must compare in constant time.
pub trait CredentialVerifier: Send + Sync {
    fn scheme(&self) -> HashScheme;
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error>;
    fn verify(&self, password: &Password, hash: &str) -> bool;
}

/// Argon2id with explicit cost parameters.
pub struct Argon2Verifier {
    params: Params,
}

impl Argon2Verifier {
    pub fn new(config: &PasswordConfig) -> Result<Self, anyhow::Error> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            Some(32),
        )
        .map_err(|e| anyhow::anyhow!("Invalid argon2 parameters: {}", e))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn scheme(&self) -> HashScheme {
        HashScheme::Argon2id
    }

    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(PasswordHashString::new(hash))
    }

    fn verify(&self, password: &Password, hash: &str) -> bool {
        // Parameters come from the PHC string, so older cost settings still verify.
        PasswordHash::new(hash)
            .map(|parsed| {
                self.argon2()
                    .verify_password(password.as_str().as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

/// Legacy bcrypt hashes.
pub struct BcryptVerifier {
    cost: u32,
}

impl BcryptVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptVerifier {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialVerifier for BcryptVerifier {
    fn scheme(&self) -> HashScheme {
        HashScheme::Bcrypt
    }

    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        bcrypt::hash(password.as_str(), self.cost)
            .map(PasswordHashString::new)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
    }

    fn verify(&self, password: &Password, hash: &str) -> bool {
        bcrypt::verify(password.as_str(), hash).unwrap_or(false)
    }
}

/// Result of checking a password against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid { needs_rehash: bool },
    Invalid,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid { .. })
    }
}

/// Dispatches verification to the verifier matching the stored scheme.
#[derive(Clone)]
pub struct PasswordHasherSet {
    preferred: Arc<dyn CredentialVerifier>,
    legacy: Vec<Arc<dyn CredentialVerifier>>,
    dummy_hash: Arc<str>,
}

impl PasswordHasherSet {
    pub fn new(
        preferred: Arc<dyn CredentialVerifier>,
        legacy: Vec<Arc<dyn CredentialVerifier>>,
    ) -> Result<Self, anyhow::Error> {
        let dummy_hash = preferred
            .hash(&Password::new("timing-equalizer".to_string()))?
            .into_string();
        Ok(Self {
            preferred,
            legacy,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Argon2id from `config` plus bcrypt for legacy rows.
    pub fn from_config(config: &PasswordConfig) -> Result<Self, anyhow::Error> {
        Self::new(
            Arc::new(Argon2Verifier::new(config)?),
            vec![Arc::new(BcryptVerifier::default())],
        )
    }

    pub fn hash_password(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        self.preferred.hash(password)
    }

    /// [`Self::hash_password`] on the blocking pool.
    pub async fn hash_password_blocking(
        &self,
        password: Password,
    ) -> Result<PasswordHashString, anyhow::Error> {
        let hashers = self.clone();
        tokio::task::spawn_blocking(move || hashers.hash_password(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
    }

    pub fn verify(&self, password: &Password, stored_hash: &str) -> Verification {
        let Some(scheme) = HashScheme::detect(stored_hash) else {
            tracing::warn!("stored password hash has an unknown scheme");
            return Verification::Invalid;
        };

        let verifier = std::iter::once(&self.preferred)
            .chain(self.legacy.iter())
            .find(|v| v.scheme() == scheme);

        match verifier {
            Some(v) if v.verify(password, stored_hash) => Verification::Valid {
                needs_rehash: scheme != self.preferred.scheme(),
            },
            _ => Verification::Invalid,
        }
    }

    /// Burn a verification against a fixed hash so unknown emails cost as much as wrong passwords.
    pub fn verify_dummy(&self, password: &Password) {
        let _ = self.preferred.verify(password, &self.dummy_hash);
    }
}
