// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end manager tests.
//!
//! `TestHarness` assembles a [`ConnectionManager`] with an in-memory broker
//! registered for every provider type, a memory secret store, and either a
//! memory or a temp-file SQLite profile store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mqlens_bus::EventBus;
use mqlens_core::profile::RabbitMqParams;
use mqlens_core::{
    AdapterSettings, ConnectionParams, ConnectionProfile, MqError, ProfileStore, ProviderType,
    SecretStore,
};
use mqlens_manager::{ConnectionManager, ProfileBook};
use mqlens_plugin::AdapterRegistry;
use mqlens_storage::{Database, SqliteProfileStore};
use strum::IntoEnumIterator;

use crate::broker::{BrokerOptions, BrokerState, MockFactory};
use crate::stores::{MemoryProfileStore, MemorySecretStore};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    options: BrokerOptions,
    secrets: Option<Arc<dyn SecretStore>>,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            options: BrokerOptions::default(),
            secrets: None,
            sqlite: false,
        }
    }

    /// Fault injection for every adapter the harness creates.
    pub fn with_broker_options(mut self, options: BrokerOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the memory secret store, e.g. with a failing one.
    pub fn with_secret_store(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Persist profiles in a temp-file SQLite database.
    pub fn with_sqlite_profiles(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, MqError> {
        let state = BrokerState::new();
        let mut registry = AdapterRegistry::new();
        let mut counters = Vec::new();
        for provider in ProviderType::iter() {
            let factory =
                MockFactory::with_options(provider, Arc::clone(&state), self.options.clone());
            counters.push(factory.created_counter());
            registry.register(Box::new(factory))?;
        }

        let memory_secrets = Arc::new(MemorySecretStore::new());
        let secrets = self
            .secrets
            .unwrap_or_else(|| Arc::clone(&memory_secrets) as Arc<dyn SecretStore>);

        let memory_profiles = Arc::new(MemoryProfileStore::new());
        let (profile_store, temp_dir): (Arc<dyn ProfileStore>, _) = if self.sqlite {
            let dir =
                tempfile::TempDir::new().map_err(|e| MqError::Storage { source: e.into() })?;
            let path = dir.path().join("profiles.db");
            let db = Database::open(&path.to_string_lossy()).await?;
            (Arc::new(SqliteProfileStore::new(db)), Some(dir))
        } else {
            (Arc::clone(&memory_profiles) as Arc<dyn ProfileStore>, None)
        };

        let manager = ConnectionManager::new(
            Arc::new(registry),
            AdapterSettings::default(),
            ProfileBook::new(profile_store, secrets),
            EventBus::new(64),
        );

        Ok(TestHarness {
            manager: Arc::new(manager),
            state,
            secrets: memory_secrets,
            profiles: memory_profiles,
            counters,
            _temp_dir: temp_dir,
        })
    }
}

/// A manager wired to in-memory doubles.
pub struct TestHarness {
    pub manager: Arc<ConnectionManager>,
    pub state: Arc<BrokerState>,
    /// Unused when a custom secret store was supplied.
    pub secrets: Arc<MemorySecretStore>,
    /// Unused when SQLite profiles were requested.
    pub profiles: Arc<MemoryProfileStore>,
    counters: Vec<Arc<AtomicUsize>>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, MqError> {
        Self::builder().build().await
    }

    /// Adapters created across all providers.
    pub fn adapters_created(&self) -> usize {
        self.counters.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Saves a RabbitMQ profile carrying a password and returns its id.
    pub async fn add_rabbit_profile(&self, name: &str) -> Result<String, MqError> {
        let profile = ConnectionProfile::new(
            name,
            ConnectionParams::RabbitMq(RabbitMqParams {
                username: Some("guest".into()),
                password: Some("guest-pw".into()),
                ..RabbitMqParams::default()
            }),
        );
        Ok(self.manager.profiles().save(profile).await?.id)
    }

    /// Saves a profile and connects it in one step.
    pub async fn connected_rabbit(&self, name: &str) -> Result<String, MqError> {
        let id = self.add_rabbit_profile(name).await?;
        self.manager.connect(&id).await?;
        Ok(id)
    }
}
