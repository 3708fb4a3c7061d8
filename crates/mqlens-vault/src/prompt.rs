// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase acquisition via TTY prompt or the `MQLENS_VAULT_KEY` environment variable.

use mqlens_core::MqError;
use secrecy::SecretString;
use zeroize::Zeroizing;

/// The environment variable name for providing the vault passphrase.
pub const VAULT_KEY_ENV_VAR: &str = "MQLENS_VAULT_KEY";

/// Where the vault passphrase comes from.
///
/// `confirm` is set when the answer will create a new vault or replace the
/// passphrase, so interactive sources ask twice.
pub trait PassphraseSource: Send + Sync {
    fn passphrase(&self, confirm: bool) -> Result<SecretString, MqError>;
}

/// Environment variable first, then an interactive prompt on a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePassphrase;

impl PassphraseSource for InteractivePassphrase {
    fn passphrase(&self, confirm: bool) -> Result<SecretString, MqError> {
        if confirm {
            get_vault_passphrase_with_confirm()
        } else {
            get_vault_passphrase()
        }
    }
}

/// A passphrase supplied up front, used by tests and non-interactive callers.
pub struct FixedPassphrase(Zeroizing<String>);

impl FixedPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }
}

impl PassphraseSource for FixedPassphrase {
    fn passphrase(&self, _confirm: bool) -> Result<SecretString, MqError> {
        Ok(SecretString::from(self.0.as_str().to_owned()))
    }
}

fn from_env() -> Option<SecretString> {
    std::env::var(VAULT_KEY_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn read_line(label: &str) -> Result<String, MqError> {
    eprint!("{label}: ");
    rpassword::read_password()
        .map_err(|e| MqError::SecretStore(format!("failed to read passphrase: {e}")))
}

fn no_source() -> MqError {
    MqError::SecretStore(format!(
        "no passphrase provided; set {VAULT_KEY_ENV_VAR} or run interactively"
    ))
}

/// Get the vault passphrase from `MQLENS_VAULT_KEY` or an interactive prompt.
pub fn get_vault_passphrase() -> Result<SecretString, MqError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(no_source());
    }
    let passphrase = read_line("Vault passphrase")?;
    if passphrase.is_empty() {
        return Err(MqError::SecretStore("empty passphrase not allowed".to_string()));
    }
    Ok(SecretString::from(passphrase))
}

/// Like [`get_vault_passphrase`], but an interactive prompt asks twice.
pub fn get_vault_passphrase_with_confirm() -> Result<SecretString, MqError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(no_source());
    }
    let first = read_line("New vault passphrase")?;
    let second = read_line("Confirm vault passphrase")?;
    if first != second {
        return Err(MqError::SecretStore("passphrases do not match".to_string()));
    }
    if first.is_empty() {
        return Err(MqError::SecretStore("empty passphrase not allowed".to_string()));
    }
    Ok(SecretString::from(first))
}
