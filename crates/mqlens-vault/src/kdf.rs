// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from a passphrase.
//!
//! Derives a 32-byte key using Argon2id (Algorithm::Argon2id, Version::V0x13).
//! The parameters used at creation are stored with the vault so a later
//! config change never locks it.

use mqlens_config::model::VaultConfig;
use mqlens_core::MqError;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::random_bytes;

/// Argon2id cost parameters, persisted as JSON in `vault_meta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<&VaultConfig> for KdfParams {
    fn from(config: &VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }
}

impl KdfParams {
    /// Derive a 32-byte wrapping key, zeroed on drop.
    pub fn derive(&self, passphrase: &[u8], salt: &[u8; 16]) -> Result<Zeroizing<[u8; 32]>, MqError> {
        let params = argon2::Params::new(self.memory_cost, self.iterations, self.parallelism, Some(32))
            .map_err(|e| MqError::SecretStore(format!("invalid Argon2id parameters: {e}")))?;
        let argon2 =
            argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut output = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(passphrase, salt, output.as_mut())
            .map_err(|e| MqError::SecretStore(format!("Argon2id key derivation failed: {e}")))?;
        Ok(output)
    }
}

/// Generate a random 16-byte salt for Argon2id.
pub fn generate_salt() -> Result<[u8; 16], MqError> {
    random_bytes::<16>()
}
