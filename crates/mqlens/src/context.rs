// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application context: configuration, storage, vault and the connection
//! manager, built once per invocation and passed to every command.

use std::sync::Arc;

use mqlens_bus::EventBus;
use mqlens_config::MqlensConfig;
use mqlens_core::{ConnectionProfile, MqError};
use mqlens_manager::{ConnectionManager, ProfileBook};
use mqlens_plugin::{AdapterRegistry, AdapterStatus, builtin_catalog};
use mqlens_storage::{Database, SqliteProfileStore};
use mqlens_vault::{InteractivePassphrase, KdfParams, VaultSecretStore};
use tracing::debug;

pub struct AppContext {
    pub config: MqlensConfig,
    pub secrets: Arc<VaultSecretStore>,
    pub manager: ConnectionManager,
}

impl AppContext {
    pub async fn open(config: MqlensConfig) -> Result<Self, MqError> {
        let db =
            Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
        debug!(path = %config.storage.database_path, "database opened");

        let secrets = Arc::new(VaultSecretStore::new(
            db.connection().clone(),
            KdfParams::from(&config.vault),
            Arc::new(InteractivePassphrase),
        ));
        let profiles = ProfileBook::new(
            Arc::new(SqliteProfileStore::new(db)),
            Arc::clone(&secrets) as Arc<dyn mqlens_core::SecretStore>,
        );
        let manager = ConnectionManager::new(
            Arc::new(builtin_registry()?),
            config.adapter_settings(),
            profiles,
            EventBus::new(config.events.capacity),
        );

        Ok(Self {
            config,
            secrets,
            manager,
        })
    }

    /// Finds a profile by id, or else by its unique name.
    pub async fn resolve_profile(&self, key: &str) -> Result<ConnectionProfile, MqError> {
        let profiles = self.manager.profiles().list().await?;
        if let Some(profile) = profiles.iter().find(|p| p.id == key) {
            return Ok(profile.clone());
        }
        let mut named = profiles.into_iter().filter(|p| p.name == key);
        match (named.next(), named.next()) {
            (Some(profile), None) => Ok(profile),
            (Some(_), Some(_)) => Err(MqError::InvalidProfile(format!(
                "several profiles are named `{key}`; use the profile id"
            ))),
            (None, _) => Err(MqError::ProfileNotFound(key.to_string())),
        }
    }

    /// Resolves and connects a profile, returning its id.
    pub async fn connect(&self, key: &str) -> Result<String, MqError> {
        let profile = self.resolve_profile(key).await?;
        self.manager.connect(&profile.id).await?;
        Ok(profile.id)
    }

    pub async fn shutdown(&self) {
        self.manager.disconnect_all().await;
    }
}

/// Registry with every compiled-in adapter enabled. Adapters left out of the
/// build stay listed as unavailable.
pub fn builtin_registry() -> Result<AdapterRegistry, MqError> {
    let mut registry = AdapterRegistry::new();

    #[cfg(feature = "ibmmq")]
    registry.register(Box::new(mqlens_ibmmq::IbmMqFactory))?;
    #[cfg(feature = "rabbitmq")]
    registry.register(Box::new(mqlens_rabbitmq::RabbitMqFactory))?;
    #[cfg(feature = "kafka")]
    registry.register(Box::new(mqlens_kafka::KafkaFactory))?;
    #[cfg(feature = "activemq")]
    registry.register(Box::new(mqlens_activemq::ActiveMqFactory))?;
    #[cfg(feature = "servicebus")]
    registry.register(Box::new(mqlens_servicebus::ServiceBusFactory))?;
    #[cfg(feature = "sqs")]
    registry.register(Box::new(mqlens_sqs::SqsFactory))?;

    for manifest in builtin_catalog() {
        if registry.get(manifest.provider_type).is_none() {
            registry.register_with_manifest(manifest, None, AdapterStatus::Unavailable)?;
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use mqlens_core::ProviderType;

    use super::*;

    #[test]
    #[cfg(all(
        feature = "ibmmq",
        feature = "rabbitmq",
        feature = "kafka",
        feature = "activemq",
        feature = "servicebus",
        feature = "sqs"
    ))]
    fn default_build_enables_every_provider() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 6);
        assert!(
            registry
                .list_all()
                .iter()
                .all(|e| e.status == AdapterStatus::Enabled)
        );
        assert!(registry.get(ProviderType::AwsSqs).is_some());
    }

    #[tokio::test]
    async fn profiles_resolve_by_id_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MqlensConfig::default();
        config.storage.database_path = dir.path().join("m.db").to_string_lossy().into_owned();
        let ctx = AppContext::open(config).await.unwrap();

        let kafka = |name: &str| {
            ConnectionProfile::new(
                name,
                mqlens_core::ConnectionParams::Kafka(mqlens_core::profile::KafkaParams {
                    brokers: vec!["k:9092".into()],
                    ..Default::default()
                }),
            )
        };
        let saved = ctx.manager.profiles().save(kafka("events")).await.unwrap();
        assert_eq!(ctx.resolve_profile("events").await.unwrap().id, saved.id);
        assert_eq!(ctx.resolve_profile(&saved.id).await.unwrap().name, "events");

        ctx.manager.profiles().save(kafka("events")).await.unwrap();
        assert!(matches!(
            ctx.resolve_profile("events").await,
            Err(MqError::InvalidProfile(_))
        ));
        assert!(matches!(
            ctx.resolve_profile("nope").await,
            Err(MqError::ProfileNotFound(_))
        ));
    }
}
