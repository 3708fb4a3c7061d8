// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted credential vault for mqlens.
//!
//! Connection passwords, connection strings and access keys are kept here,
//! never in the profile table. A random master key encrypts every entry and
//! is itself wrapped by a passphrase-derived key via Argon2id.

pub mod crypto;
pub mod kdf;
pub mod prompt;
pub mod store;
pub mod vault;

pub use kdf::KdfParams;
pub use prompt::{FixedPassphrase, InteractivePassphrase, PassphraseSource, get_vault_passphrase};
pub use store::VaultSecretStore;
pub use vault::{Vault, mask_secret};
