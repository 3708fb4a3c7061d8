// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection profiles and their secret-bearing fields.
//!
//! A profile is a tagged variant over the provider type. On the wire it is
//! `{"id", "name", "providerType", "connectionParams": {...}}`. Secret fields
//! are plain `Option<String>`s here; the connection manager moves them into the
//! secret store before a profile is persisted and puts them back on connect or
//! on export with secrets.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::types::ProviderType;

/// A named, persisted description of how to reach one broker instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    /// Opaque identity. Empty means not yet assigned.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub params: ConnectionParams,
}

impl ConnectionProfile {
    pub fn new(name: impl Into<String>, params: ConnectionParams) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            params,
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        self.params.provider_type()
    }

    /// Assigns a fresh UUID when the profile has no identity yet. Returns true
    /// if an id was assigned.
    pub fn ensure_id(&mut self) -> bool {
        if self.id.trim().is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
            true
        } else {
            false
        }
    }
}

/// Provider-specific connection parameters, tagged by `providerType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "providerType", content = "connectionParams", rename_all = "lowercase")]
pub enum ConnectionParams {
    IbmMq(IbmMqParams),
    RabbitMq(RabbitMqParams),
    Kafka(KafkaParams),
    ActiveMq(ActiveMqParams),
    AzureServiceBus(ServiceBusParams),
    AwsSqs(SqsParams),
}

/// Kinds of secret a profile can carry. The display form is the `<kind>`
/// component of the secret store key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SecretField {
    Password,
    TlsPassphrase,
    ConnectionString,
    ClientSecret,
    SecretAccessKey,
}

impl SecretField {
    /// Secret store key for this field of the given profile:
    /// `secret.<kind>.<profileId>`.
    pub fn key_for(self, profile_id: &str) -> String {
        format!("secret.{self}.{profile_id}")
    }
}

impl ConnectionParams {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ConnectionParams::IbmMq(_) => ProviderType::IbmMq,
            ConnectionParams::RabbitMq(_) => ProviderType::RabbitMq,
            ConnectionParams::Kafka(_) => ProviderType::Kafka,
            ConnectionParams::ActiveMq(_) => ProviderType::ActiveMq,
            ConnectionParams::AzureServiceBus(_) => ProviderType::AzureServiceBus,
            ConnectionParams::AwsSqs(_) => ProviderType::AwsSqs,
        }
    }

    /// The secret-bearing fields this provider's parameters define.
    pub fn secret_fields(&self) -> &'static [SecretField] {
        match self {
            ConnectionParams::IbmMq(_) => &[SecretField::Password, SecretField::TlsPassphrase],
            ConnectionParams::RabbitMq(_)
            | ConnectionParams::Kafka(_)
            | ConnectionParams::ActiveMq(_) => &[SecretField::Password],
            ConnectionParams::AzureServiceBus(_) => {
                &[SecretField::ConnectionString, SecretField::ClientSecret]
            }
            ConnectionParams::AwsSqs(_) => &[SecretField::SecretAccessKey],
        }
    }

    /// Mutable access to the slot holding `field`, if this provider has one.
    pub fn secret_slot_mut(&mut self, field: SecretField) -> Option<&mut Option<String>> {
        match (self, field) {
            (ConnectionParams::IbmMq(p), SecretField::Password) => Some(&mut p.password),
            (ConnectionParams::IbmMq(p), SecretField::TlsPassphrase) => Some(&mut p.tls_passphrase),
            (ConnectionParams::RabbitMq(p), SecretField::Password) => Some(&mut p.password),
            (ConnectionParams::Kafka(p), SecretField::Password) => Some(&mut p.password),
            (ConnectionParams::ActiveMq(p), SecretField::Password) => Some(&mut p.password),
            (ConnectionParams::AzureServiceBus(p), SecretField::ConnectionString) => {
                Some(&mut p.connection_string)
            }
            (ConnectionParams::AzureServiceBus(p), SecretField::ClientSecret) => {
                Some(&mut p.client_secret)
            }
            (ConnectionParams::AwsSqs(p), SecretField::SecretAccessKey) => {
                Some(&mut p.secret_access_key)
            }
            _ => None,
        }
    }

    /// Current value of a secret field, if present and non-empty.
    pub fn secret(&self, field: SecretField) -> Option<&str> {
        let slot = match (self, field) {
            (ConnectionParams::IbmMq(p), SecretField::Password) => &p.password,
            (ConnectionParams::IbmMq(p), SecretField::TlsPassphrase) => &p.tls_passphrase,
            (ConnectionParams::RabbitMq(p), SecretField::Password) => &p.password,
            (ConnectionParams::Kafka(p), SecretField::Password) => &p.password,
            (ConnectionParams::ActiveMq(p), SecretField::Password) => &p.password,
            (ConnectionParams::AzureServiceBus(p), SecretField::ConnectionString) => {
                &p.connection_string
            }
            (ConnectionParams::AzureServiceBus(p), SecretField::ClientSecret) => &p.client_secret,
            (ConnectionParams::AwsSqs(p), SecretField::SecretAccessKey) => &p.secret_access_key,
            _ => return None,
        };
        slot.as_deref().filter(|s| !s.is_empty())
    }

    /// Removes every secret from the parameters and returns the non-empty ones.
    pub fn take_secrets(&mut self) -> Vec<(SecretField, String)> {
        let mut taken = Vec::new();
        for &field in self.secret_fields() {
            if let Some(slot) = self.secret_slot_mut(field)
                && let Some(value) = slot.take()
                && !value.is_empty()
            {
                taken.push((field, value));
            }
        }
        taken
    }

    /// True when any secret field carries a value.
    pub fn has_secrets(&self) -> bool {
        self.secret_fields()
            .iter()
            .any(|&field| self.secret(field).is_some())
    }
}

fn default_ibmmq_port() -> u16 {
    1414
}

fn default_amqp_port() -> u16 {
    5672
}

fn default_management_port() -> u16 {
    15672
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_openwire_port() -> u16 {
    61616
}

fn default_broker_name() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbmMqParams {
    pub queue_manager: String,
    pub host: String,
    #[serde(default = "default_ibmmq_port")]
    pub port: u16,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cipher_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_passphrase: Option<String>,
    /// mqweb REST base URL; defaults to `https://<host>:9443/ibmmq/rest/v2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Queue names probed when the administrative listing is denied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_queues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMqParams {
    pub host: String,
    #[serde(default = "default_amqp_port")]
    pub port: u16,
    #[serde(default = "default_management_port")]
    pub management_port: u16,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
    /// Overrides the management API base URL derived from host and port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_url: Option<String>,
}

impl Default for RabbitMqParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_amqp_port(),
            management_port: default_management_port(),
            vhost: default_vhost(),
            username: None,
            password: None,
            use_tls: false,
            management_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaParams {
    pub brokers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMqParams {
    pub host: String,
    #[serde(default = "default_openwire_port")]
    pub port: u16,
    /// Jolokia endpoint; defaults to `http://<host>:8161/api/jolokia`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jolokia_url: Option<String>,
    #[serde(default = "default_broker_name")]
    pub broker_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ActiveMqParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_openwire_port(),
            jolokia_url: None,
            broker_name: default_broker_name(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBusParams {
    /// SAS connection string; takes precedence over the AAD credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// e.g. `contoso.servicebus.windows.net`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Overrides the AAD authority, e.g. for sovereign clouds or tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_host: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsParams {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    /// Custom endpoint (LocalStack, ElasticMQ, VPC endpoints).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name_prefix: Option<String>,
}
