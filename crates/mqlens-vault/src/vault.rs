// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault lifecycle: create, unlock, store, retrieve, list, and delete secrets.
//!
//! The vault uses a key-wrapping pattern:
//! - A random master key encrypts every credential (stored in `vault_entries`).
//! - The master key itself is sealed with a key derived from the user's
//!   passphrase via Argon2id (stored in `vault_meta` as `wrapped_master_key`).
//! - Changing the passphrase only re-wraps the master key; entries are never
//!   re-encrypted.

use mqlens_core::MqError;
use rusqlite::{OptionalExtension, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{self, Sealed};
use crate::kdf::{self, KdfParams};

/// The unlocked vault, holding the master key in memory.
///
/// Debug output omits the master key.
pub struct Vault {
    master_key: Zeroizing<[u8; 32]>,
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

/// Everything `vault_meta` holds, written and read as one unit.
struct VaultMeta {
    wrapped: Sealed,
    salt: [u8; 16],
    kdf: KdfParams,
}

impl VaultMeta {
    /// Seals `master_key` under a fresh salt and the given KDF cost.
    fn wrap(
        master_key: &[u8; 32],
        passphrase: &SecretString,
        kdf: KdfParams,
    ) -> Result<Self, MqError> {
        let salt = kdf::generate_salt()?;
        let wrapping_key = kdf.derive(passphrase.expose_secret().as_bytes(), &salt)?;
        let wrapped = crypto::seal(&wrapping_key, master_key)?;
        Ok(Self { wrapped, salt, kdf })
    }

    fn unwrap_key(&self, passphrase: &SecretString) -> Result<Zeroizing<[u8; 32]>, MqError> {
        let wrapping_key = self
            .kdf
            .derive(passphrase.expose_secret().as_bytes(), &self.salt)?;
        let bytes = Zeroizing::new(crypto::open(&wrapping_key, &self.wrapped).map_err(|_| {
            MqError::SecretStore("invalid passphrase or corrupted vault".to_string())
        })?);
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            MqError::SecretStore("corrupted master key (expected 32 bytes)".to_string())
        })?;
        Ok(Zeroizing::new(key))
    }

    async fn save(&self, conn: &tokio_rusqlite::Connection) -> Result<(), MqError> {
        let kdf_json = serde_json::to_vec(&self.kdf)
            .map_err(|e| MqError::Internal(format!("serialize KDF params: {e}")))?;
        let rows: Vec<(&'static str, Vec<u8>)> = vec![
            ("wrapped_master_key", self.wrapped.ciphertext.clone()),
            ("master_key_nonce", self.wrapped.nonce.to_vec()),
            ("kdf_salt", self.salt.to_vec()),
            ("kdf_params", kdf_json),
        ];
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            for (key, value) in rows {
                tx.execute(
                    "INSERT OR REPLACE INTO vault_meta (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
    }

    async fn load(conn: &tokio_rusqlite::Connection) -> Result<Self, MqError> {
        let [wrapped, nonce, salt, kdf_json] = conn
            .call(|conn| -> Result<[Vec<u8>; 4], rusqlite::Error> {
                let read = |key: &str| -> Result<Vec<u8>, rusqlite::Error> {
                    conn.query_row(
                        "SELECT value FROM vault_meta WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                };
                Ok([
                    read("wrapped_master_key")?,
                    read("master_key_nonce")?,
                    read("kdf_salt")?,
                    read("kdf_params")?,
                ])
            })
            .await
            .map_err(map_tr_err)?;

        let kdf: KdfParams = serde_json::from_slice(&kdf_json)
            .map_err(|e| MqError::SecretStore(format!("corrupted KDF params: {e}")))?;
        let salt: [u8; 16] = salt
            .try_into()
            .map_err(|_| MqError::SecretStore("corrupted salt (expected 16 bytes)".to_string()))?;
        Ok(Self {
            wrapped: Sealed::from_parts(wrapped, &nonce)?,
            salt,
            kdf,
        })
    }
}

impl Vault {
    /// True when a wrapped master key has been written.
    pub async fn exists(conn: &tokio_rusqlite::Connection) -> Result<bool, MqError> {
        conn.call(|conn| -> Result<bool, rusqlite::Error> {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM vault_meta WHERE key = 'wrapped_master_key'",
                [],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
    }

    /// Create a new vault with a random master key wrapped by the passphrase.
    pub async fn create(
        conn: tokio_rusqlite::Connection,
        passphrase: &SecretString,
        kdf: KdfParams,
    ) -> Result<Self, MqError> {
        let master_key = Zeroizing::new(crypto::generate_random_key()?);
        VaultMeta::wrap(&master_key, passphrase, kdf)?
            .save(&conn)
            .await?;
        info!("vault created");
        Ok(Self { master_key, conn })
    }

    /// Unlock an existing vault with the KDF parameters it was created with.
    pub async fn unlock(
        conn: tokio_rusqlite::Connection,
        passphrase: &SecretString,
    ) -> Result<Self, MqError> {
        let master_key = VaultMeta::load(&conn).await?.unwrap_key(passphrase)?;
        debug!("vault unlocked");
        Ok(Self { master_key, conn })
    }

    /// Encrypt and store a value under `name`, replacing any previous value.
    pub async fn store_secret(&self, name: &str, plaintext: &str) -> Result<(), MqError> {
        let sealed = crypto::seal(&self.master_key, plaintext.as_bytes())?;
        let name_owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO vault_entries (name, ciphertext, nonce) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO UPDATE SET
                         ciphertext = excluded.ciphertext,
                         nonce = excluded.nonce,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![name_owned, sealed.ciphertext, sealed.nonce.to_vec()],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(name = %name, "secret stored in vault");
        Ok(())
    }

    /// Decrypt the value stored under `name`, if any.
    pub async fn retrieve_secret(&self, name: &str) -> Result<Option<SecretString>, MqError> {
        let name = name.to_string();
        let entry = self
            .conn
            .call(move |conn| -> Result<Option<(Vec<u8>, Vec<u8>)>, rusqlite::Error> {
                conn.query_row(
                    "SELECT ciphertext, nonce FROM vault_entries WHERE name = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;

        let Some((ciphertext, nonce)) = entry else {
            return Ok(None);
        };
        let plaintext = Zeroizing::new(crypto::open(
            &self.master_key,
            &Sealed::from_parts(ciphertext, &nonce)?,
        )?);
        let value = String::from_utf8(plaintext.to_vec())
            .map_err(|e| MqError::SecretStore(format!("decrypted value is not UTF-8: {e}")))?;
        Ok(Some(SecretString::from(value)))
    }

    /// Names of every stored entry, sorted.
    pub async fn list_names(&self) -> Result<Vec<String>, MqError> {
        self.conn
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT name FROM vault_entries ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// `(name, masked preview)` for every entry.
    pub async fn list_secrets(&self) -> Result<Vec<(String, String)>, MqError> {
        let mut result = Vec::new();
        for name in self.list_names().await? {
            let preview = match self.retrieve_secret(&name).await {
                Ok(Some(secret)) => mask_secret(secret.expose_secret()),
                _ => "[error: could not decrypt]".to_string(),
            };
            result.push((name, preview));
        }
        Ok(result)
    }

    /// Remove an entry. Removing a missing entry succeeds.
    pub async fn delete_secret(&self, name: &str) -> Result<(), MqError> {
        let name_owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM vault_entries WHERE name = ?1",
                    params![name_owned],
                )
            })
            .await
            .map_err(map_tr_err)?;
        debug!(name = %name, "secret deleted from vault");
        Ok(())
    }

    /// Re-wrap the master key under a new passphrase and KDF cost.
    pub async fn change_passphrase(
        &self,
        new_passphrase: &SecretString,
        kdf: KdfParams,
    ) -> Result<(), MqError> {
        VaultMeta::wrap(&self.master_key, new_passphrase, kdf)?
            .save(&self.conn)
            .await?;
        info!("vault passphrase changed");
        Ok(())
    }
}

/// Mask a secret for display: first four and last four characters.
///
/// Values shorter than 10 characters are fully masked as `****`.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MqError {
    MqError::SecretStore(format!("vault database error: {e}"))
}
