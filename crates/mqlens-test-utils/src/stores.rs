// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory secret and profile stores.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mqlens_core::{ConnectionProfile, MqError, ProfileStore, SecretStore};
use secrecy::SecretString;

/// Secret store backed by a map. Keys can be inspected by tests.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Plaintext of `key`, for assertions.
    pub fn value(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, MqError> {
        Ok(self.lock().get(key).map(|v| SecretString::from(v.clone())))
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), MqError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MqError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Secret store whose every operation fails, as a locked vault would.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSecretStore;

#[async_trait]
impl SecretStore for FailingSecretStore {
    async fn get(&self, _key: &str) -> Result<Option<SecretString>, MqError> {
        Err(MqError::SecretStore("vault unavailable".into()))
    }

    async fn store(&self, _key: &str, _value: &str) -> Result<(), MqError> {
        Err(MqError::SecretStore("vault unavailable".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), MqError> {
        Err(MqError::SecretStore("vault unavailable".into()))
    }
}

/// Profile store backed by a vector. Like the SQLite store it refuses
/// profiles that still carry secrets.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<Vec<ConnectionProfile>>,
    saves: AtomicUsize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: Vec<ConnectionProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            saves: AtomicUsize::new(0),
        }
    }

    /// What is currently persisted.
    pub fn snapshot(&self) -> Vec<ConnectionProfile> {
        self.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ConnectionProfile>> {
        self.profiles.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load_profiles(&self) -> Result<Vec<ConnectionProfile>, MqError> {
        Ok(self.snapshot())
    }

    async fn save_profiles(&self, profiles: &[ConnectionProfile]) -> Result<(), MqError> {
        if let Some(leaky) = profiles.iter().find(|p| p.params.has_secrets()) {
            return Err(MqError::InvalidProfile(format!(
                "profile `{}` still carries secret fields",
                leaky.id
            )));
        }
        *self.lock() = profiles.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
