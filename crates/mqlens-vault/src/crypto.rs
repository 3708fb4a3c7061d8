// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.

use mqlens_core::MqError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

/// Ciphertext (with the 16-byte GCM tag appended) and the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; 12],
}

impl Sealed {
    /// Rebuilds a sealed value from stored columns, checking the nonce width.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8]) -> Result<Self, MqError> {
        let nonce = nonce
            .try_into()
            .map_err(|_| MqError::SecretStore("corrupted nonce (expected 12 bytes)".to_string()))?;
        Ok(Self { ciphertext, nonce })
    }
}

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, MqError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| MqError::SecretStore("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// `N` bytes from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], MqError> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| MqError::SecretStore("system random source unavailable".to_string()))?;
    Ok(out)
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Sealed, MqError> {
    let nonce = random_bytes::<12>()?;
    let mut in_out = plaintext.to_vec();
    aead_key(key)?
        .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| MqError::SecretStore("AES-256-GCM encryption failed".to_string()))?;
    Ok(Sealed {
        ciphertext: in_out,
        nonce,
    })
}

/// Decrypt a [`Sealed`] value. Fails when the key is wrong or the data was
/// tampered with.
pub fn open(key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>, MqError> {
    let mut in_out = sealed.ciphertext.clone();
    let plaintext = aead_key(key)?
        .open_in_place(
            Nonce::assume_unique_for_key(sealed.nonce),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| {
            MqError::SecretStore("decryption failed: wrong key or corrupted data".to_string())
        })?;
    Ok(plaintext.to_vec())
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<[u8; 32], MqError> {
    random_bytes::<32>()
}
