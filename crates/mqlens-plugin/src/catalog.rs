// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in broker catalog.
//!
//! Manifests for the six adapters compiled into the mqlens binary.

use mqlens_core::{ProviderType, SecretField};

use crate::manifest::{AdapterManifest, Capability};

fn manifest(
    name: &str,
    provider_type: ProviderType,
    description: &str,
    capabilities: &[Capability],
    secret_fields: &[SecretField],
) -> AdapterManifest {
    AdapterManifest {
        name: name.to_string(),
        provider_type,
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: description.to_string(),
        capabilities: capabilities.to_vec(),
        secret_fields: secret_fields.to_vec(),
    }
}

/// Manifests for every built-in adapter, in provider order.
pub fn builtin_catalog() -> Vec<AdapterManifest> {
    use Capability::*;

    vec![
        manifest(
            "ibmmq",
            ProviderType::IbmMq,
            "IBM MQ via the mqweb administrative and messaging REST APIs",
            &[Topics, Channels, NativeBrowse, NativeDelete],
            &[SecretField::Password, SecretField::TlsPassphrase],
        ),
        manifest(
            "rabbitmq",
            ProviderType::RabbitMq,
            "RabbitMQ via the management HTTP API",
            &[Topics, DrainReplay],
            &[SecretField::Password],
        ),
        manifest(
            "kafka",
            ProviderType::Kafka,
            "Apache Kafka topics browsed by offset",
            &[Topics, NativeBrowse],
            &[SecretField::Password],
        ),
        manifest(
            "activemq",
            ProviderType::ActiveMq,
            "ActiveMQ Classic via Jolokia JMX-over-HTTP",
            &[Topics, NativeBrowse, NativeDelete],
            &[SecretField::Password],
        ),
        manifest(
            "azureservicebus",
            ProviderType::AzureServiceBus,
            "Azure Service Bus via the REST API with peek-lock leases",
            &[Topics, Lease],
            &[SecretField::ConnectionString, SecretField::ClientSecret],
        ),
        manifest(
            "awssqs",
            ProviderType::AwsSqs,
            "Amazon SQS via the JSON protocol with visibility-timeout leases",
            &[Lease],
            &[SecretField::SecretAccessKey],
        ),
    ]
}

/// The built-in manifest for `provider`.
pub fn catalog_entry(provider: ProviderType) -> Option<AdapterManifest> {
    builtin_catalog()
        .into_iter()
        .find(|m| m.provider_type == provider)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mqlens_core::ConnectionParams;
    use mqlens_core::profile::{
        ActiveMqParams, IbmMqParams, KafkaParams, RabbitMqParams, ServiceBusParams, SqsParams,
    };
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn catalog_covers_every_provider_once() {
        let catalog = builtin_catalog();
        let providers: HashSet<ProviderType> = catalog.iter().map(|m| m.provider_type).collect();
        assert_eq!(catalog.len(), 6);
        for provider in ProviderType::iter() {
            assert!(providers.contains(&provider), "missing {provider}");
        }
    }

    #[test]
    fn catalog_names_match_wire_names() {
        for entry in builtin_catalog() {
            assert_eq!(entry.name, entry.provider_type.to_string());
        }
    }

    #[test]
    fn secret_fields_match_profile_model() {
        let samples = [
            ConnectionParams::IbmMq(IbmMqParams::default()),
            ConnectionParams::RabbitMq(RabbitMqParams::default()),
            ConnectionParams::Kafka(KafkaParams::default()),
            ConnectionParams::ActiveMq(ActiveMqParams::default()),
            ConnectionParams::AzureServiceBus(ServiceBusParams::default()),
            ConnectionParams::AwsSqs(SqsParams::default()),
        ];
        for params in samples {
            let entry = catalog_entry(params.provider_type()).unwrap();
            assert_eq!(entry.secret_fields, params.secret_fields());
        }
    }

    #[test]
    fn only_ibmmq_has_channels() {
        let with_channels: Vec<_> = builtin_catalog()
            .into_iter()
            .filter(|m| m.capabilities.contains(&Capability::Channels))
            .map(|m| m.provider_type)
            .collect();
        assert_eq!(with_channels, [ProviderType::IbmMq]);
    }
}
