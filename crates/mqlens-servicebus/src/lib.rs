// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Azure Service Bus adapter for mqlens.
//!
//! Management reads go through the namespace's Atom feed endpoints; data
//! operations use the HTTP send and peek-lock endpoints. Browsing locks
//! messages and abandons them afterwards, so each browse increments their
//! delivery count.

pub mod atom;
pub mod auth;
pub mod client;

use std::sync::Arc;

use async_trait::async_trait;
use mqlens_browse::{browse_with_lease, clear_with_lease, delete_with_lease};
use mqlens_core::filter::retain_matching;
use mqlens_core::{
    AdapterFactory, AdapterSettings, BrowseOptions, ConnectionParams, Message, MessagingProvider,
    MqError, PropertyMap, ProviderType, QueueInfo, QueueProperties, SessionCell, TopicInfo,
    TopicOperations, TopicProperties, bounded,
};
use mqlens_http::RestClient;
use serde_json::Value;
use tracing::{debug, info};

use crate::atom::Entry;
use crate::client::{EntityKind, QueueLeases, ServiceBusSession};

/// Fields copied verbatim into the attribute map.
const QUEUE_ATTRIBUTES: &[&str] = &[
    "LockDuration",
    "MaxSizeInMegabytes",
    "SizeInBytes",
    "RequiresDuplicateDetection",
    "RequiresSession",
    "DefaultMessageTimeToLive",
    "DeadLetteringOnMessageExpiration",
    "MaxDeliveryCount",
    "EnablePartitioning",
    "Status",
    "ActiveMessageCount",
    "DeadLetterMessageCount",
    "ScheduledMessageCount",
    "TransferMessageCount",
    "CreatedAt",
    "UpdatedAt",
];

const TOPIC_ATTRIBUTES: &[&str] = &[
    "MaxSizeInMegabytes",
    "SizeInBytes",
    "DefaultMessageTimeToLive",
    "EnablePartitioning",
    "SupportOrdering",
    "Status",
    "CreatedAt",
    "UpdatedAt",
];

/// Visible messages: active count when the broker reports it, total otherwise.
fn depth_of(entry: &Entry) -> Option<u64> {
    entry
        .number("ActiveMessageCount")
        .or_else(|| entry.number("MessageCount"))
}

fn attributes_of(entry: &Entry, keys: &[&str]) -> PropertyMap {
    keys.iter()
        .filter_map(|key| {
            let raw = entry.field(key)?;
            let value = raw
                .parse::<u64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<bool>().map(Value::from))
                .unwrap_or_else(|_| Value::from(raw));
            Some(((*key).to_string(), value))
        })
        .collect()
}

pub struct ServiceBusAdapter {
    settings: AdapterSettings,
    session: SessionCell<ServiceBusSession>,
}

impl ServiceBusAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            session: SessionCell::new(),
        }
    }

    fn leases<'a>(&self, session: &'a ServiceBusSession, queue: &'a str) -> QueueLeases<'a> {
        QueueLeases {
            session,
            queue,
            timeout_secs: self.settings.receive_wait.as_secs(),
        }
    }
}

#[async_trait]
impl MessagingProvider for ServiceBusAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AzureServiceBus
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<(), MqError> {
        let ConnectionParams::AzureServiceBus(params) = params else {
            return Err(MqError::InvalidProfile(format!(
                "expected azure service bus parameters, got {}",
                params.provider_type()
            )));
        };
        let (endpoint, credentials) = auth::from_params(params, self.settings.operation_timeout)?;
        let rest = RestClient::builder(endpoint.clone())
            .timeout(self.settings.operation_timeout)
            .build()?;
        let session = ServiceBusSession::new(rest, credentials);
        bounded(self.settings.connect_timeout, session.probe()).await?;
        info!(endpoint = %endpoint, "connected to Service Bus");
        self.session.install(session).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), MqError> {
        if self.session.take().await.is_some() {
            debug!("Service Bus session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn list_queues(&self, filter: Option<&str>) -> Result<Vec<QueueInfo>, MqError> {
        let session = self.session.lock().await?;
        let mut queues: Vec<QueueInfo> = session
            .entities(EntityKind::Queues)
            .await?
            .into_iter()
            .filter(Entry::is_queue)
            .filter_map(|entry| {
                let mut info = QueueInfo::new(entry.name()?);
                info.depth = depth_of(&entry);
                if let Some(status) = entry.field("Status") {
                    info.attributes.insert("status".into(), Value::from(status));
                }
                Some(info)
            })
            .collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        retain_matching(&mut queues, filter, |q| &q.name);
        Ok(queues)
    }

    async fn get_queue_properties(&self, queue: &str) -> Result<QueueProperties, MqError> {
        let session = self.session.lock().await?;
        let entry = session.entity(EntityKind::Queues, queue).await?;
        Ok(QueueProperties {
            name: queue.to_string(),
            depth: depth_of(&entry),
            max_depth: None,
            durable: None,
            consumer_count: None,
            description: entry.field("UserMetadata").map(str::to_string),
            attributes: attributes_of(&entry, QUEUE_ATTRIBUTES),
        })
    }

    async fn get_queue_depth(&self, queue: &str) -> Result<u64, MqError> {
        let session = self.session.lock().await?;
        let entry = session.entity(EntityKind::Queues, queue).await?;
        Ok(depth_of(&entry).unwrap_or(0))
    }

    async fn browse_messages(
        &self,
        queue: &str,
        options: &BrowseOptions,
    ) -> Result<Vec<Message>, MqError> {
        let session = self.session.lock().await?;
        browse_with_lease(&self.leases(&session, queue), options, self.settings.batch_size).await
    }

    async fn put_message(
        &self,
        queue: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        session
            .send(EntityKind::Queues, queue, payload, properties)
            .await
    }

    async fn delete_message(&self, queue: &str, message_id: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        let ids = [message_id.to_string()];
        delete_with_lease(&self.leases(&session, queue), &ids, self.settings.batch_size)
            .await?
            .into_single(message_id)
    }

    async fn delete_messages(&self, queue: &str, message_ids: &[String]) -> Result<usize, MqError> {
        let session = self.session.lock().await?;
        delete_with_lease(&self.leases(&session, queue), message_ids, self.settings.batch_size)
            .await?
            .into_result()
    }

    async fn clear_queue(&self, queue: &str) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        let removed = clear_with_lease(&self.leases(&session, queue), self.settings.batch_size).await?;
        debug!(queue, removed, "queue cleared");
        Ok(())
    }

    fn topics(&self) -> Option<&dyn TopicOperations> {
        Some(self)
    }
}

#[async_trait]
impl TopicOperations for ServiceBusAdapter {
    async fn list_topics(&self, filter: Option<&str>) -> Result<Vec<TopicInfo>, MqError> {
        let session = self.session.lock().await?;
        let mut topics: Vec<TopicInfo> = session
            .entities(EntityKind::Topics)
            .await?
            .into_iter()
            .filter(Entry::is_topic)
            .filter_map(|entry| {
                Some(TopicInfo {
                    name: entry.name()?.to_string(),
                    topic_string: None,
                })
            })
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        retain_matching(&mut topics, filter, |t| &t.name);
        Ok(topics)
    }

    async fn get_topic_properties(&self, topic: &str) -> Result<TopicProperties, MqError> {
        let session = self.session.lock().await?;
        let entry = session.entity(EntityKind::Topics, topic).await?;
        Ok(TopicProperties {
            name: topic.to_string(),
            topic_string: None,
            subscription_count: entry.number("SubscriptionCount"),
            partition_count: None,
            attributes: attributes_of(&entry, TOPIC_ATTRIBUTES),
        })
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &[u8],
        properties: Option<&PropertyMap>,
    ) -> Result<(), MqError> {
        let session = self.session.lock().await?;
        session
            .send(EntityKind::Topics, topic, payload, properties)
            .await
    }
}

/// Builds [`ServiceBusAdapter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceBusFactory;

impl AdapterFactory for ServiceBusFactory {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AzureServiceBus
    }

    fn create(&self, settings: &AdapterSettings) -> Result<Arc<dyn MessagingProvider>, MqError> {
        Ok(Arc::new(ServiceBusAdapter::new(settings.clone())))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn entry(fields: &[(&str, &str)]) -> Entry {
        Entry {
            description: Some("QueueDescription".into()),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn depth_prefers_active_count() {
        assert_eq!(depth_of(&entry(&[("MessageCount", "9"), ("ActiveMessageCount", "4")])), Some(4));
        assert_eq!(depth_of(&entry(&[("MessageCount", "9")])), Some(9));
        assert_eq!(depth_of(&entry(&[])), None);
    }

    #[test]
    fn attributes_are_typed() {
        let attrs = attributes_of(
            &entry(&[("MaxDeliveryCount", "10"), ("RequiresSession", "false"), ("Status", "Active")]),
            QUEUE_ATTRIBUTES,
        );
        assert_eq!(attrs["MaxDeliveryCount"], Value::from(10));
        assert_eq!(attrs["RequiresSession"], Value::from(false));
        assert_eq!(attrs["Status"], Value::from("Active"));
    }

    #[tokio::test]
    async fn wrong_params_are_rejected() {
        let adapter = ServiceBusAdapter::new(AdapterSettings::default());
        let err = adapter
            .connect(&ConnectionParams::Kafka(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, MqError::InvalidProfile(_)));
        assert!(!adapter.is_connected());
    }
}
