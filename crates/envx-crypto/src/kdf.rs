//! Key derivation: Argon2id password → 256-bit key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use envx_core::config::CryptoConfig;
use envx_core::{EnvxError, EnvxResult};

use crate::KEY_SIZE;

/// KDF identifier recorded in container metadata
pub const KDF_ARGON2ID: &str = "argon2id";

/// Highest memory cost accepted from a container (1 GiB)
pub const MAX_MEM_COST_KIB: u32 = 1024 * 1024;
/// Highest iteration count accepted from a container
pub const MAX_TIME_COST: u32 = 16;
/// Highest lane count accepted from a container
pub const MAX_PARALLELISM: u32 = 16;

/// A 256-bit key derived from a password via Argon2id.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for KDF
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Always `argon2id` at this format version
    #[serde(default = "default_kdf_algorithm")]
    pub algorithm: String,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

fn default_kdf_algorithm() -> String {
    KDF_ARGON2ID.to_string()
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            algorithm: default_kdf_algorithm(),
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl From<&CryptoConfig> for KdfParams {
    fn from(config: &CryptoConfig) -> Self {
        Self {
            algorithm: default_kdf_algorithm(),
            mem_cost_kib: config.argon2_mem_cost_kib,
            time_cost: config.argon2_time_cost,
            parallelism: config.argon2_parallelism,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and benchmarks. Never use for real data.
    pub fn insecure_fast() -> Self {
        Self {
            algorithm: default_kdf_algorithm(),
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Reject costs outside the accepted ceiling. Container metadata is not
    /// authenticated, so these values are untrusted until checked.
    pub fn check_bounds(&self) -> EnvxResult<()> {
        if self.mem_cost_kib == 0 || self.mem_cost_kib > MAX_MEM_COST_KIB {
            return Err(EnvxError::Format(format!(
                "KDF memory cost {} KiB outside 1..={MAX_MEM_COST_KIB}",
                self.mem_cost_kib
            )));
        }
        if self.time_cost == 0 || self.time_cost > MAX_TIME_COST {
            return Err(EnvxError::Format(format!(
                "KDF time cost {} outside 1..={MAX_TIME_COST}",
                self.time_cost
            )));
        }
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(EnvxError::Format(format!(
                "KDF parallelism {} outside 1..={MAX_PARALLELISM}",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// Derive a 256-bit key from a password and salt using Argon2id.
///
/// The salt must be freshly random per encryption and is stored alongside
/// the ciphertext (it does not need to be secret). Empty passwords are
/// accepted; strength policy belongs to the caller.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> EnvxResult<DerivedKey> {
    if params.algorithm != KDF_ARGON2ID {
        return Err(EnvxError::Format(format!(
            "unsupported KDF algorithm '{}'",
            params.algorithm
        )));
    }

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| anyhow::anyhow!("invalid Argon2id params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| anyhow::anyhow!("Argon2id KDF failed: {e}"))?;

    Ok(DerivedKey::from_bytes(key))
}
