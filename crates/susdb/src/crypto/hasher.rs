//! Secret hashing with Argon2id.
//!
//! Secrets are never hashed raw. They are first wrapped in the canonical
//! envelope (the JSON string encoding of the secret) and the envelope bytes
//! are hashed. `store` and `verify` must both go through
//! [`canonical_envelope`] or verification will always fail.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) so
//! each one carries its own salt and cost parameters. Verification reads
//! the parameters from the stored string, which means records hashed under
//! older settings keep verifying after the defaults change.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::crypto::random::random_salt_16;
use crate::error::{Result, StoreError};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl HasherParams {
    /// Cheap parameters for tests and benchmarks. Not for production data.
    pub fn fast() -> Self {
        Self {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

impl Default for HasherParams {
    /// The argon2 crate's RFC 9106 defaults (19 MiB, 2 iterations, 1 lane).
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

/// One-way, memory-hard hasher for identity secrets.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
    params: HasherParams,
}

impl Hasher {
    /// Build a hasher, validating the cost parameters.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if argon2 rejects the parameters
    /// (e.g. memory cost below `8 * p_cost` KiB).
    pub fn new(params: HasherParams) -> Result<Self> {
        let argon2_params = Params::new(params.m_cost, params.t_cost, params.p_cost, None)
            .map_err(|e| StoreError::Validation(format!("Argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params),
            params,
        })
    }

    /// The parameters new hashes are produced with.
    pub fn params(&self) -> HasherParams {
        self.params
    }

    /// Hash `secret` with a fresh random salt and return the PHC string.
    pub fn hash(&self, secret: &[u8]) -> Result<String> {
        let salt = SaltString::encode_b64(&random_salt_16())
            .map_err(|e| StoreError::HashingFailed(format!("salt encoding: {e}")))?;
        let hash = self
            .argon2
            .hash_password(secret, &salt)
            .map_err(|e| StoreError::HashingFailed(format!("Argon2 hash: {e}")))?;
        Ok(hash.to_string())
    }

    /// Check `secret` against a stored PHC hash string.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::HashMismatch` if the secret does not match, or
    /// `StoreError::InvalidFileFormat` if `hash` is not a valid PHC string.
    pub fn verify(&self, hash: &str, secret: &[u8]) -> Result<()> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| StoreError::InvalidFileFormat(format!("stored hash: {e}")))?;
        match self.argon2.verify_password(secret, &parsed) {
            Ok(()) => Ok(()),
            Err(password_hash::Error::Password) => Err(StoreError::HashMismatch),
            Err(e) => Err(StoreError::HashingFailed(format!("Argon2 verify: {e}"))),
        }
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").field("params", &self.params).finish()
    }
}

/// Serialize a secret into the canonical envelope that gets hashed.
///
/// The envelope is the JSON string encoding of the secret, so `abc` becomes
/// `"abc"` (quotes included). The buffer is wiped on drop.
pub fn canonical_envelope(secret: &str) -> Result<Zeroizing<String>> {
    serde_json::to_string(secret)
        .map(Zeroizing::new)
        .map_err(|e| StoreError::SerializationError(e.to_string()))
}
