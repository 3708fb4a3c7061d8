// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`SecretStore`] backed by the encrypted vault.
//!
//! The vault is unlocked on first use. Reads and deletes against a database
//! that has no vault yet succeed without asking for a passphrase; the first
//! write creates the vault.

use std::sync::Arc;

use async_trait::async_trait;
use mqlens_core::{MqError, SecretStore};
use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::info;

use crate::kdf::KdfParams;
use crate::prompt::PassphraseSource;
use crate::vault::Vault;

pub struct VaultSecretStore {
    conn: tokio_rusqlite::Connection,
    kdf: KdfParams,
    passphrase: Arc<dyn PassphraseSource>,
    vault: OnceCell<Vault>,
}

impl VaultSecretStore {
    /// `kdf` applies only when this store creates the vault.
    pub fn new(
        conn: tokio_rusqlite::Connection,
        kdf: KdfParams,
        passphrase: Arc<dyn PassphraseSource>,
    ) -> Self {
        Self {
            conn,
            kdf,
            passphrase,
            vault: OnceCell::new(),
        }
    }

    pub async fn exists(&self) -> Result<bool, MqError> {
        if self.vault.initialized() {
            return Ok(true);
        }
        Vault::exists(&self.conn).await
    }

    /// The unlocked vault. With `create`, a missing vault is created;
    /// otherwise a missing vault yields `None`.
    async fn unlocked(&self, create: bool) -> Result<Option<&Vault>, MqError> {
        if let Some(vault) = self.vault.get() {
            return Ok(Some(vault));
        }
        if !create && !Vault::exists(&self.conn).await? {
            return Ok(None);
        }
        self.vault
            .get_or_try_init(|| async {
                if Vault::exists(&self.conn).await? {
                    let passphrase = self.passphrase.passphrase(false)?;
                    Vault::unlock(self.conn.clone(), &passphrase).await
                } else {
                    let passphrase = self.passphrase.passphrase(true)?;
                    let vault = Vault::create(self.conn.clone(), &passphrase, self.kdf).await?;
                    info!("vault created on first secret write");
                    Ok(vault)
                }
            })
            .await
            .map(Some)
    }

    /// Unlock an existing vault, failing when none has been created.
    pub async fn vault(&self) -> Result<&Vault, MqError> {
        self.unlocked(false)
            .await?
            .ok_or_else(|| MqError::SecretStore("no vault has been created yet".to_string()))
    }

    /// `(key, masked preview)` for every stored secret; empty without a vault.
    pub async fn list_masked(&self) -> Result<Vec<(String, String)>, MqError> {
        match self.unlocked(false).await? {
            Some(vault) => vault.list_secrets().await,
            None => Ok(Vec::new()),
        }
    }

    /// Re-wrap the vault under `new_passphrase` using this store's KDF cost.
    pub async fn change_passphrase(&self, new_passphrase: &SecretString) -> Result<(), MqError> {
        self.vault()
            .await?
            .change_passphrase(new_passphrase, self.kdf)
            .await
    }
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("unlocked", &self.vault.initialized())
            .field("kdf", &self.kdf)
            .finish()
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, MqError> {
        match self.unlocked(false).await? {
            Some(vault) => vault.retrieve_secret(key).await,
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), MqError> {
        let vault = self
            .unlocked(true)
            .await?
            .ok_or_else(|| MqError::Internal("vault unavailable after creation".to_string()))?;
        vault.store_secret(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), MqError> {
        match self.unlocked(false).await? {
            Some(vault) => vault.delete_secret(key).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::prompt::FixedPassphrase;
    use secrecy::ExposeSecret;

    const CHEAP: KdfParams = KdfParams {
        memory_cost: 32768,
        iterations: 2,
        parallelism: 1,
    };

    /// Counts prompts so tests can assert none happened.
    struct CountingSource {
        calls: AtomicUsize,
        inner: FixedPassphrase,
    }

    impl PassphraseSource for CountingSource {
        fn passphrase(&self, confirm: bool) -> Result<SecretString, MqError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.passphrase(confirm)
        }
    }

    async fn setup() -> (tokio_rusqlite::Connection, Arc<CountingSource>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = mqlens_storage::Database::open(dir.path().join("s.db").to_str().unwrap())
            .await
            .unwrap();
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            inner: FixedPassphrase::new("store-pass"),
        });
        (db.connection().clone(), source, dir)
    }

    #[tokio::test]
    async fn reads_without_vault_do_not_prompt() {
        let (conn, source, _dir) = setup().await;
        let store = VaultSecretStore::new(conn, CHEAP, source.clone());
        assert!(store.get("secret.password.x").await.unwrap().is_none());
        store.delete("secret.password.x").await.unwrap();
        assert!(store.list_masked().await.unwrap().is_empty());
        assert!(!store.exists().await.unwrap());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_write_creates_then_later_store_unlocks() {
        let (conn, source, _dir) = setup().await;
        let store = VaultSecretStore::new(conn.clone(), CHEAP, source.clone());
        store.store("secret.password.p", "hunter2hunter2").await.unwrap();
        store.store("secret.password.q", "other").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let reopened = VaultSecretStore::new(conn, CHEAP, source.clone());
        let value = reopened.get("secret.password.p").await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "hunter2hunter2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn wrong_passphrase_surfaces_as_secret_store_error() {
        let (conn, source, _dir) = setup().await;
        VaultSecretStore::new(conn.clone(), CHEAP, source)
            .store("k", "v")
            .await
            .unwrap();

        let wrong = VaultSecretStore::new(conn, CHEAP, Arc::new(FixedPassphrase::new("nope")));
        assert!(matches!(
            wrong.get("k").await,
            Err(MqError::SecretStore(_))
        ));
    }

    #[tokio::test]
    async fn change_passphrase_requires_existing_vault() {
        let (conn, source, _dir) = setup().await;
        let store = VaultSecretStore::new(conn.clone(), CHEAP, source);
        let new = SecretString::from("fresh".to_string());
        assert!(store.change_passphrase(&new).await.is_err());

        store.store("k", "v").await.unwrap();
        store.change_passphrase(&new).await.unwrap();
        let reopened = VaultSecretStore::new(conn, CHEAP, Arc::new(FixedPassphrase::new("fresh")));
        assert!(reopened.get("k").await.unwrap().is_some());
    }
}
